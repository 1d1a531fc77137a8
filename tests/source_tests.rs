//! Integration tests for the SQLite data source.
//!
//! These tests load seeded replicas (in memory and on disk) through the
//! `DataSource` trait the reports consume.

use rusqlite::Connection;
use stride_analytics::db::{DataSource, Database, FolderShape, SqliteSource, WorkItemShape};
use stride_analytics::error::AnalyticsError;

const SEED: &str = "
    INSERT INTO users (username, first_name, last_name, email, organization_id) VALUES
        ('ana', 'Ana', 'Silva', 'ana@example.com', 'acme'),
        ('bo', 'Bo', NULL, NULL, 'globex');
    INSERT INTO boards (id, label, organization_id) VALUES
        ('b1', 'Core', 'acme'),
        ('b2', 'Other', 'globex');
    INSERT INTO lanes (id, name, color, organization_id) VALUES
        ('l1', 'Doing', '#00f', 'acme'),
        ('l2', 'Done', '#0f0', 'acme');
    INSERT INTO work_types (id, name, organization_id) VALUES ('t1', 'Feature', 'acme');
    INSERT INTO priorities (id, name, organization_id) VALUES ('p1', 'High', 'acme');
    INSERT INTO folders (id, number, title, parent_number, item_count, archived, hierarchy_path, organization_id) VALUES
        ('f1', 'F1', 'Platform', NULL, 2, 0, 'Platform', 'acme'),
        ('f2', 'F2', 'Payments', 'F1', 1, 0, 'Platform/Payments', 'acme'),
        ('f3', 'F3', 'Old stuff', 'F1', 0, 1, NULL, 'acme'),
        ('f9', 'F9', 'Elsewhere', NULL, 0, 0, NULL, 'globex');
    INSERT INTO workitems (id, number, title, assignee_username, author_username, completed_at,
                           date_added, date_updated, time_spent_seconds, work_type_id, lane_id,
                           board_id, priority_id, likely_estimate, parent_number, root_folder_number,
                           tags, organization_id) VALUES
        ('w1', '101', 'Checkout', 'ana', 'ana', '2024-01-05T12:00:00Z',
         '2024-01-02 09:00:00', '2024-01-05 12:00:00', 7200, 't1', 'l2', 'b1', 'p1', 1.5, 'F2', 'F1',
         '[\"ui\"]', 'acme'),
        ('w2', '102', 'Refunds', NULL, 'ana', NULL,
         '2024-01-03', NULL, NULL, NULL, 'l1', 'b1', NULL, NULL, '101', 'F1', NULL, 'acme'),
        ('w3', '900', 'Other org', 'bo', 'bo', NULL,
         '2024-01-03', NULL, 60, NULL, NULL, 'b2', NULL, NULL, 'F9', 'F9', NULL, 'globex');
    INSERT INTO time_entries (id, author_username, item_number, start_date, end_date, length_seconds,
                              completed, manual, date_added, organization_id) VALUES
        ('e1', 'ana', '101', '2024-01-04 10:00:00', '2024-01-04 12:00:00', 7200, 1, 0, '2024-01-04 12:00:00', 'acme'),
        ('e2', 'bo', '900', '2024-01-04 10:00:00', NULL, 60, 0, 1, '2024-01-04 10:01:00', 'globex');
";

/// Helper to create a seeded in-memory replica.
fn setup_db() -> Database {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    db.with_conn(|conn| {
        conn.execute_batch(SEED)?;
        Ok(())
    })
    .expect("Failed to seed database");
    db
}

fn source(org: Option<&str>) -> SqliteSource {
    SqliteSource::new(setup_db(), org.map(str::to_string)).expect("Failed to open source")
}

mod loading {
    use super::*;

    #[test]
    fn loads_work_items_with_typed_fields() {
        let source = source(None);
        assert_eq!(source.capabilities().work_items, WorkItemShape::Extended);

        let items = source.work_items().unwrap();
        assert_eq!(items.len(), 3);

        let checkout = items.iter().find(|i| i.number == "101").unwrap();
        assert_eq!(checkout.assignee.as_deref(), Some("ana"));
        assert!(checkout.is_completed());
        assert_eq!(checkout.time_spent_seconds, Some(7200));
        assert_eq!(checkout.likely_estimate, Some(1.5));
        assert_eq!(checkout.tags.as_deref(), Some("[\"ui\"]"));
        assert_eq!(
            checkout.date_added.unwrap().to_rfc3339(),
            "2024-01-02T09:00:00+00:00"
        );

        let refunds = items.iter().find(|i| i.number == "102").unwrap();
        assert!(refunds.assignee.is_none());
        assert!(refunds.date_updated.is_none());
        assert_eq!(refunds.parent_number.as_deref(), Some("101"));
    }

    #[test]
    fn archived_folders_are_skipped() {
        let folders = source(None).folders().unwrap();
        let numbers: Vec<&str> = folders.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(numbers, vec!["F1", "F2", "F9"]);

        let payments = &folders[1];
        assert_eq!(payments.parent_id.as_deref(), Some("F1"));
        assert_eq!(payments.item_count, 1);
        assert_eq!(payments.hierarchy_path.as_deref(), Some("Platform/Payments"));
    }

    #[test]
    fn time_entries_and_labels() {
        let source = source(None);
        let entries = source.time_entries().unwrap();
        assert_eq!(entries.len(), 2);
        let manual = entries.iter().find(|e| e.id == "e2").unwrap();
        assert!(manual.manual);
        assert!(manual.end_date.is_none());

        let lanes = source.lanes().unwrap();
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].name, "Doing");
        assert_eq!(lanes[1].color.as_deref(), Some("#0f0"));
    }
}

mod organization_scope {
    use super::*;

    #[test]
    fn scoped_tables_only_return_the_organization() {
        let source = source(Some("acme"));
        assert_eq!(source.organization_id(), Some("acme"));

        let items = source.work_items().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.number != "900"));

        let boards = source.boards().unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].label, "Core");

        assert_eq!(source.time_entries().unwrap().len(), 1);
        assert_eq!(source.folders().unwrap().len(), 2);
        assert_eq!(source.count_rows("workitems").unwrap(), 2);
    }

    #[test]
    fn users_are_shared_across_organizations() {
        let source = source(Some("acme"));
        assert_eq!(source.users().unwrap().len(), 2);
        assert_eq!(source.count_rows("users").unwrap(), 2);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let err = source(None).count_rows("sqlite_master").unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingTable(_)));
    }
}

mod basic_shape {
    use super::*;

    /// A replica that predates the optional columns and has no org scoping.
    fn basic_db() -> Database {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (username TEXT, first_name TEXT, last_name TEXT, email TEXT);
             CREATE TABLE work_types (id TEXT, name TEXT, color TEXT);
             CREATE TABLE priorities (id TEXT, name TEXT, color TEXT);
             CREATE TABLE lanes (id TEXT, name TEXT, color TEXT);
             CREATE TABLE boards (id TEXT, label TEXT);
             CREATE TABLE folders (number TEXT, title TEXT, parent_number TEXT, item_count INTEGER,
                                   archived INTEGER, date_added TEXT, date_updated TEXT);
             CREATE TABLE workitems (id TEXT, number TEXT, title TEXT, assignee_username TEXT,
                 author_username TEXT, completed_at TEXT, date_added TEXT, date_updated TEXT,
                 start_date TEXT, due_date TEXT, time_spent_seconds INTEGER, archived INTEGER,
                 work_type_id TEXT, lane_id TEXT, board_id TEXT, priority_id TEXT,
                 optimistic_estimate REAL, likely_estimate REAL, pessimistic_estimate REAL,
                 point_effort REAL, parent_number TEXT, root_folder_number TEXT);
             CREATE TABLE time_entries (id TEXT, author_username TEXT, item_number TEXT,
                 description TEXT, start_date TEXT, end_date TEXT, length_seconds INTEGER,
                 completed INTEGER, manual INTEGER, date_added TEXT);
             INSERT INTO folders VALUES ('F1', 'Root', NULL, 1, NULL, NULL, NULL);
             INSERT INTO workitems (id, number, title, parent_number) VALUES ('w1', '1', 'Only', 'F1');",
        )
        .unwrap();
        Database::from_connection(conn)
    }

    #[test]
    fn optional_columns_are_left_empty() {
        let source = SqliteSource::new(basic_db(), Some("acme".into())).unwrap();
        let caps = source.capabilities();
        assert_eq!(caps.work_items, WorkItemShape::Basic);
        assert_eq!(caps.folders, FolderShape::Basic);

        // No organization_id column anywhere, so the scope is ignored
        let items = source.work_items().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].tags.is_none());
        assert!(items[0].custom_fields.is_none());

        let folders = source.folders().unwrap();
        assert_eq!(folders.len(), 1);
        assert!(folders[0].hierarchy_path.is_none());
    }

    #[test]
    fn missing_table_is_reported_not_raised() {
        let source = SqliteSource::new(basic_db(), None).unwrap();
        let report = source.schema_report(2).unwrap();

        let teams = report.table("teams").unwrap();
        assert!(teams.error.is_some());
        assert!(teams.columns.is_empty());

        let items = report.table("workitems").unwrap();
        assert!(items.error.is_none());
        assert_eq!(items.row_count, Some(1));
    }
}

mod schema_report {
    use super::*;

    #[test]
    fn describes_every_report_table() {
        let report = source(None).schema_report(1).unwrap();
        assert_eq!(report.tables.len(), 9);
        assert!(!report.sqlite_version.is_empty());

        let items = report.table("workitems").unwrap();
        assert_eq!(items.row_count, Some(3));
        assert_eq!(items.sample_rows.len(), 1);
        assert_eq!(items.sample_rows[0].len(), items.columns.len());
        let id = items.columns.iter().find(|c| c.name == "id").unwrap();
        assert!(id.primary_key);
    }

    #[test]
    fn counts_follow_the_organization_scope() {
        let report = source(Some("globex")).schema_report(5).unwrap();
        assert_eq!(report.table("workitems").unwrap().row_count, Some(1));
        assert_eq!(report.table("users").unwrap().row_count, Some(2));
    }
}

mod on_disk {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_then_open_read_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replica.db");

        let db = Database::init(&path).unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(SEED)?;
            Ok(())
        })
        .unwrap();
        drop(db);

        let source = SqliteSource::new(Database::open_read_only(&path).unwrap(), None).unwrap();
        assert_eq!(source.work_items().unwrap().len(), 3);
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replica.db");
        drop(Database::init(&path).unwrap());

        let db = Database::open_read_only(&path).unwrap();
        let result = db.with_conn(|conn| {
            conn.execute("INSERT INTO teams (id, name) VALUES ('t', 'T')", [])?;
            Ok(())
        });
        assert!(matches!(result, Err(AnalyticsError::Database(_))));
    }

    #[test]
    fn missing_workitems_table_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.db");
        drop(Connection::open(&path).unwrap());

        let db = Database::open_read_only(&path).unwrap();
        let err = SqliteSource::new(db, None).err().unwrap();
        assert!(matches!(err, AnalyticsError::MissingTable(t) if t == "workitems"));
    }
}
