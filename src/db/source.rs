//! Data source abstraction and the SQLite implementation.

use super::Database;
use super::schema::{FolderShape, SchemaCapabilities, SchemaReport, WorkItemShape, org_clause, REPORT_TABLES};
use crate::error::{AnalyticsError, Result};
use crate::types::{Board, Folder, Label, TimeEntry, User, WorkItem};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::ValueRef;
use std::time::Instant;
use tracing::{debug, info};

/// Read access to reporting records.
///
/// The dashboard and reports only see this trait, so tests and other
/// backends can supply data without a database.
pub trait DataSource: Send + Sync {
    fn capabilities(&self) -> &SchemaCapabilities;

    fn work_items(&self) -> Result<Vec<WorkItem>>;
    fn time_entries(&self) -> Result<Vec<TimeEntry>>;
    fn users(&self) -> Result<Vec<User>>;
    fn work_types(&self) -> Result<Vec<Label>>;
    fn priorities(&self) -> Result<Vec<Label>>;
    fn boards(&self) -> Result<Vec<Board>>;
    fn lanes(&self) -> Result<Vec<Label>>;
    /// Non-archived folders only.
    fn folders(&self) -> Result<Vec<Folder>>;

    /// Row count of one of the report tables, scoped like the loaders.
    fn count_rows(&self, table: &str) -> Result<i64>;

    fn schema_report(&self, sample_rows: usize) -> Result<SchemaReport>;
}

const ITEM_COLUMNS: &str = "id, number, title, assignee_username, author_username, \
    completed_at, date_added, date_updated, start_date, due_date, time_spent_seconds, archived, \
    work_type_id, lane_id, board_id, priority_id, \
    optimistic_estimate, likely_estimate, pessimistic_estimate, point_effort, \
    parent_number, root_folder_number";

const FOLDER_COLUMNS: &str = "number, title, parent_number, item_count, date_added, date_updated";

/// `DataSource` over a SQLite reporting replica.
pub struct SqliteSource {
    db: Database,
    organization_id: Option<String>,
    caps: SchemaCapabilities,
}

impl SqliteSource {
    /// Wrap a database, detecting its capabilities once.
    pub fn new(db: Database, organization_id: Option<String>) -> Result<Self> {
        let caps = db.with_conn(SchemaCapabilities::detect)?;
        info!(
            work_items = ?caps.work_items,
            folders = ?caps.folders,
            organization = organization_id.as_deref().unwrap_or("*"),
            "Detected replica schema"
        );
        Ok(Self {
            db,
            organization_id,
            caps,
        })
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    /// Run `sql` (with any org clause already folded in) and map each row.
    fn load<T, F>(&self, table: &str, sql: &str, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let start = Instant::now();
        let params: Vec<&str> = self.scope_params(table);
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        debug!(
            table,
            rows = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded table"
        );
        Ok(rows)
    }

    fn scope_params(&self, table: &str) -> Vec<&str> {
        match self.organization_id.as_deref() {
            Some(org) if self.caps.is_org_scoped(table) => vec![org],
            _ => Vec::new(),
        }
    }

    fn clause(&self, table: &str) -> &'static str {
        org_clause(&self.caps, table, self.organization_id.as_deref())
    }

    fn load_labels(&self, table: &str) -> Result<Vec<Label>> {
        let sql = format!(
            "SELECT id, name, color FROM {}{} ORDER BY name",
            table,
            self.clause(table)
        );
        self.load(table, &sql, |row| {
            Ok(Label {
                id: text(row, 0)?.unwrap_or_default(),
                name: text(row, 1)?.unwrap_or_default(),
                color: text(row, 2)?,
            })
        })
    }
}

impl DataSource for SqliteSource {
    fn capabilities(&self) -> &SchemaCapabilities {
        &self.caps
    }

    fn work_items(&self) -> Result<Vec<WorkItem>> {
        let extended = self.caps.work_items == WorkItemShape::Extended;
        let sql = format!(
            "SELECT {}{} FROM workitems{} ORDER BY date_added DESC, id",
            ITEM_COLUMNS,
            if extended { ", custom_fields, description, tags" } else { "" },
            self.clause("workitems")
        );
        self.load("workitems", &sql, |row| {
            let mut item = WorkItem {
                id: text(row, 0)?.unwrap_or_default(),
                number: text(row, 1)?.unwrap_or_default(),
                title: text(row, 2)?.unwrap_or_default(),
                assignee: text(row, 3)?,
                author: text(row, 4)?,
                completed_at: timestamp(row, 5)?,
                date_added: timestamp(row, 6)?,
                date_updated: timestamp(row, 7)?,
                start_date: timestamp(row, 8)?,
                due_date: timestamp(row, 9)?,
                time_spent_seconds: integer(row, 10)?,
                archived: flag(row, 11)?,
                work_type_id: text(row, 12)?,
                lane_id: text(row, 13)?,
                board_id: text(row, 14)?,
                priority_id: text(row, 15)?,
                optimistic_estimate: real(row, 16)?,
                likely_estimate: real(row, 17)?,
                pessimistic_estimate: real(row, 18)?,
                point_effort: real(row, 19)?,
                parent_number: text(row, 20)?,
                root_folder_number: text(row, 21)?,
                ..Default::default()
            };
            if extended {
                item.custom_fields = text(row, 22)?;
                item.description = text(row, 23)?;
                item.tags = text(row, 24)?;
            }
            Ok(item)
        })
    }

    fn time_entries(&self) -> Result<Vec<TimeEntry>> {
        let sql = format!(
            "SELECT id, author_username, item_number, description, start_date, end_date, \
             length_seconds, completed, manual, date_added \
             FROM time_entries{} ORDER BY start_date DESC, id",
            self.clause("time_entries")
        );
        self.load("time_entries", &sql, |row| {
            Ok(TimeEntry {
                id: text(row, 0)?.unwrap_or_default(),
                author: text(row, 1)?,
                item_number: text(row, 2)?,
                description: text(row, 3)?,
                start_date: timestamp(row, 4)?,
                end_date: timestamp(row, 5)?,
                length_seconds: integer(row, 6)?.unwrap_or(0),
                completed: flag(row, 7)?,
                manual: flag(row, 8)?,
                date_added: timestamp(row, 9)?,
            })
        })
    }

    fn users(&self) -> Result<Vec<User>> {
        self.load(
            "users",
            "SELECT username, first_name, last_name, email FROM users ORDER BY username",
            |row| {
                Ok(User {
                    username: text(row, 0)?.unwrap_or_default(),
                    first_name: text(row, 1)?,
                    last_name: text(row, 2)?,
                    email: text(row, 3)?,
                })
            },
        )
    }

    fn work_types(&self) -> Result<Vec<Label>> {
        self.load_labels("work_types")
    }

    fn priorities(&self) -> Result<Vec<Label>> {
        self.load_labels("priorities")
    }

    fn boards(&self) -> Result<Vec<Board>> {
        let sql = format!(
            "SELECT id, label FROM boards{} ORDER BY label",
            self.clause("boards")
        );
        self.load("boards", &sql, |row| {
            Ok(Board {
                id: text(row, 0)?.unwrap_or_default(),
                label: text(row, 1)?.unwrap_or_default(),
            })
        })
    }

    fn lanes(&self) -> Result<Vec<Label>> {
        self.load_labels("lanes")
    }

    fn folders(&self) -> Result<Vec<Folder>> {
        let extended = self.caps.folders == FolderShape::Extended;
        let scope = if self.clause("folders").is_empty() {
            ""
        } else {
            " AND organization_id = ?1"
        };
        let sql = format!(
            "SELECT {}{} FROM folders WHERE COALESCE(archived, 0) = 0{} ORDER BY number",
            FOLDER_COLUMNS,
            if extended { ", hierarchy, hierarchy_path" } else { "" },
            scope
        );
        self.load("folders", &sql, |row| {
            let mut folder = Folder {
                id: text(row, 0)?.unwrap_or_default(),
                title: text(row, 1)?.unwrap_or_default(),
                parent_id: text(row, 2)?,
                item_count: integer(row, 3)?.unwrap_or(0),
                date_added: timestamp(row, 4)?,
                date_updated: timestamp(row, 5)?,
                ..Default::default()
            };
            if extended {
                folder.hierarchy = text(row, 6)?;
                folder.hierarchy_path = text(row, 7)?;
            }
            Ok(folder)
        })
    }

    fn count_rows(&self, table: &str) -> Result<i64> {
        if !REPORT_TABLES.contains(&table) {
            return Err(AnalyticsError::MissingTable(table.to_string()));
        }
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, self.clause(table));
        let params = self.scope_params(table);
        self.db.with_conn(|conn| {
            Ok(conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
                row.get::<_, i64>(0)
            })?)
        })
    }

    fn schema_report(&self, sample_rows: usize) -> Result<SchemaReport> {
        self.db
            .schema_report(&self.caps, self.organization_id.as_deref(), sample_rows)
    }
}

/// Parse a stored timestamp. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// Replicas are loosely typed: ids may arrive as integers, flags as text.

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => None,
    })
}

fn integer(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) => Some(f.round() as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.trim().parse().ok()),
        _ => None,
    })
}

fn real(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.trim().parse().ok()),
        _ => None,
    })
}

fn flag(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => i != 0,
        ValueRef::Real(f) => f != 0.0,
        ValueRef::Text(t) => matches!(
            String::from_utf8_lossy(t).trim().to_ascii_lowercase().as_str(),
            "1" | "t" | "true" | "yes"
        ),
        _ => false,
    })
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(parse_timestamp),
        ValueRef::Integer(secs) => DateTime::from_timestamp(secs, 0),
        _ => None,
    })
}
