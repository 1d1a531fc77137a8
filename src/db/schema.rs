//! Schema introspection for the reporting replica.
//!
//! Capabilities are detected once per source, so query shapes are known
//! up front instead of discovered by trial and error.

use super::Database;
use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tables covered by the schema report, in display order.
pub const REPORT_TABLES: [&str; 9] = [
    "workitems",
    "time_entries",
    "users",
    "work_types",
    "priorities",
    "boards",
    "lanes",
    "folders",
    "teams",
];

/// Tables shared across organizations.
pub const ORG_EXEMPT_TABLES: [&str; 2] = ["users", "teams"];

const EXTENDED_ITEM_COLUMNS: [&str; 3] = ["custom_fields", "description", "tags"];
const EXTENDED_FOLDER_COLUMNS: [&str; 2] = ["hierarchy", "hierarchy_path"];

/// Information about a table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Which work item columns can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemShape {
    /// Core columns plus `custom_fields`, `description` and `tags`.
    Extended,
    Basic,
}

/// Which folder columns can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderShape {
    /// Core columns plus `hierarchy` and `hierarchy_path`.
    Extended,
    Basic,
}

/// What the connected replica supports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaCapabilities {
    pub work_items: WorkItemShape,
    pub folders: FolderShape,
    /// Tables that carry an `organization_id` column.
    pub org_scoped: BTreeSet<String>,
}

impl SchemaCapabilities {
    /// Inspect the replica. Fails only when `workitems` is absent.
    pub fn detect(conn: &Connection) -> Result<Self> {
        let item_columns = column_names(conn, "workitems")?;
        if item_columns.is_empty() {
            return Err(AnalyticsError::MissingTable("workitems".to_string()));
        }
        let folder_columns = column_names(conn, "folders")?;

        let work_items = if EXTENDED_ITEM_COLUMNS.iter().all(|c| item_columns.contains(*c)) {
            WorkItemShape::Extended
        } else {
            WorkItemShape::Basic
        };
        let folders = if EXTENDED_FOLDER_COLUMNS.iter().all(|c| folder_columns.contains(*c)) {
            FolderShape::Extended
        } else {
            FolderShape::Basic
        };

        let mut org_scoped = BTreeSet::new();
        for table in REPORT_TABLES {
            if ORG_EXEMPT_TABLES.contains(&table) {
                continue;
            }
            if column_names(conn, table)?.contains("organization_id") {
                org_scoped.insert(table.to_string());
            }
        }

        Ok(Self {
            work_items,
            folders,
            org_scoped,
        })
    }

    pub fn is_org_scoped(&self, table: &str) -> bool {
        self.org_scoped.contains(table)
    }
}

/// Columns, size and a few sample rows of one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: Option<i64>,
    /// Values rendered as text, aligned with `columns`.
    pub sample_rows: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    pub generated_at: DateTime<Utc>,
    pub sqlite_version: String,
    pub tables: Vec<TableReport>,
}

impl SchemaReport {
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.name == name)
    }
}

pub(crate) fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{}')", table))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                data_type: row.get::<_, String>(2)?.to_uppercase(),
                nullable: row.get::<_, i32>(3)? == 0,
                default_value: row.get(4)?,
                primary_key: row.get::<_, i32>(5)? > 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn column_names(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    Ok(table_columns(conn, table)?.into_iter().map(|c| c.name).collect())
}

/// Render any SQLite value as display text.
pub(crate) fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// `WHERE organization_id = ?1` when the table is scoped, else empty.
pub(crate) fn org_clause(caps: &SchemaCapabilities, table: &str, org: Option<&str>) -> &'static str {
    if org.is_some() && caps.is_org_scoped(table) {
        " WHERE organization_id = ?1"
    } else {
        ""
    }
}

impl Database {
    /// Describe every report table. Per-table failures are recorded, not raised.
    pub fn schema_report(
        &self,
        caps: &SchemaCapabilities,
        org: Option<&str>,
        sample_rows: usize,
    ) -> Result<SchemaReport> {
        self.with_conn(|conn| {
            let sqlite_version: String =
                conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;

            let tables = REPORT_TABLES
                .iter()
                .map(|table| match describe_table(conn, caps, table, org, sample_rows) {
                    Ok(report) => report,
                    Err(e) => TableReport {
                        name: table.to_string(),
                        columns: Vec::new(),
                        row_count: None,
                        sample_rows: Vec::new(),
                        error: Some(e.to_string()),
                    },
                })
                .collect();

            Ok(SchemaReport {
                generated_at: Utc::now(),
                sqlite_version,
                tables,
            })
        })
    }
}

fn describe_table(
    conn: &Connection,
    caps: &SchemaCapabilities,
    table: &str,
    org: Option<&str>,
    sample_rows: usize,
) -> Result<TableReport> {
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        return Err(AnalyticsError::MissingTable(table.to_string()));
    }

    let clause = org_clause(caps, table, org);
    let params: Vec<&str> = if clause.is_empty() { Vec::new() } else { org.into_iter().collect() };

    let row_count = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"{}", table, clause),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get::<_, i64>(0),
        )
        .ok();

    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM \"{}\"{} LIMIT {}",
        table, clause, sample_rows
    ))?;
    let width = stmt.column_count();
    let samples = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(value_text))
                .collect::<rusqlite::Result<Vec<String>>>()
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(TableReport {
        name: table.to_string(),
        columns,
        row_count,
        sample_rows: samples,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_extended_schema() {
        let db = Database::open_in_memory().unwrap();
        let caps = db.with_conn(SchemaCapabilities::detect).unwrap();
        assert_eq!(caps.work_items, WorkItemShape::Extended);
        assert_eq!(caps.folders, FolderShape::Extended);
        assert!(caps.is_org_scoped("workitems"));
        assert!(!caps.is_org_scoped("users"));
    }

    #[test]
    fn test_detect_basic_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE workitems (id TEXT, number TEXT, title TEXT);
             CREATE TABLE folders (number TEXT, title TEXT, parent_number TEXT);",
        )
        .unwrap();
        let caps = SchemaCapabilities::detect(&conn).unwrap();
        assert_eq!(caps.work_items, WorkItemShape::Basic);
        assert_eq!(caps.folders, FolderShape::Basic);
        assert!(caps.org_scoped.is_empty());
    }

    #[test]
    fn test_detect_requires_workitems() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SchemaCapabilities::detect(&conn).unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingTable(t) if t == "workitems"));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(ValueRef::Null), "");
        assert_eq!(value_text(ValueRef::Integer(42)), "42");
        assert_eq!(value_text(ValueRef::Text(b"hi")), "hi");
        assert_eq!(value_text(ValueRef::Blob(&[1, 2, 3])), "<3 bytes>");
    }
}
