//! Integration tests for the reports.
//!
//! Reports run over a `SnapshotStore` backed by an in-memory `DataSource`,
//! so every figure below can be checked by hand against `fixture()`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stride_analytics::config::{RefreshConfig, RefreshMode, ReportsConfig};
use stride_analytics::db::{DataSource, FolderShape, SchemaCapabilities, SchemaReport, TableReport, WorkItemShape};
use stride_analytics::error::{AnalyticsError, Result};
use stride_analytics::hierarchy::HomeFolderRule;
use stride_analytics::report::budget::{BudgetStatus, NO_FOLDER, board_drilldown, budget_overview};
use stride_analytics::report::export::{ReportKind, render_report};
use stride_analytics::report::metrics::{key_metrics, team_report, time_report};
use stride_analytics::report::stale::stale_report;
use stride_analytics::report::value_stream::{search_streams, value_streams};
use stride_analytics::report::{FilterParams, ReportContext, ReportFilter};
use stride_analytics::snapshot::{Snapshot, SnapshotStore};
use stride_analytics::types::{Board, Folder, Label, TimeEntry, User, WorkItem};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
}

fn label(id: &str, name: &str) -> Label {
    Label {
        id: id.into(),
        name: name.into(),
        color: None,
    }
}

struct ItemSpec<'a> {
    id: &'a str,
    number: &'a str,
    board: &'a str,
    parent: Option<&'a str>,
    root: Option<&'a str>,
    assignee: &'a str,
    estimate_hours: Option<f64>,
    spent: i64,
}

fn item(spec: ItemSpec<'_>) -> WorkItem {
    let mut item = WorkItem::new(spec.id, spec.number, format!("Item {}", spec.number));
    item.board_id = Some(spec.board.into());
    item.parent_number = spec.parent.map(str::to_string);
    item.root_folder_number = spec.root.map(str::to_string);
    item.assignee = Some(spec.assignee.into());
    item.author = Some("ana".into());
    item.likely_estimate = spec.estimate_hours;
    item.time_spent_seconds = Some(spec.spent);
    item.lane_id = Some("l1".into());
    item.date_added = Some(at(2024, 1, 2));
    item.date_updated = Some(at(2024, 1, 10));
    item
}

/// In-memory replica used by every test.
#[derive(Default)]
struct MemorySource {
    items: Vec<WorkItem>,
    entries: Vec<TimeEntry>,
    boards: Vec<Board>,
    lanes: Vec<Label>,
    work_types: Vec<Label>,
    folders: Vec<Folder>,
    caps: Option<SchemaCapabilities>,
    item_loads: AtomicUsize,
}

fn fixture() -> MemorySource {
    let mut checkout = item(ItemSpec {
        id: "w1",
        number: "101",
        board: "b1",
        parent: Some("F2"),
        root: Some("F1"),
        assignee: "ana",
        estimate_hours: Some(2.0),
        spent: 9000,
    });
    checkout.completed_at = Some(at(2024, 1, 5));
    checkout.lane_id = Some("l2".into());
    checkout.work_type_id = Some("t1".into());

    let mut refund = item(ItemSpec {
        id: "w2",
        number: "102",
        board: "b1",
        parent: Some("F3"),
        root: Some("F1"),
        assignee: "bo",
        estimate_hours: Some(1.0),
        spent: 1800,
    });
    refund.work_type_id = Some("t2".into());
    refund.date_updated = Some(at(2024, 1, 2));

    let mut loose = item(ItemSpec {
        id: "w3",
        number: "103",
        board: "b1",
        parent: None,
        root: None,
        assignee: "ana",
        estimate_hours: None,
        spent: 600,
    });
    loose.date_updated = Some(at(2024, 1, 20));

    let pager = item(ItemSpec {
        id: "w4",
        number: "201",
        board: "b2",
        parent: Some("F4"),
        root: Some("F4"),
        assignee: "cy",
        estimate_hours: Some(1.0),
        spent: 3600,
    });

    let mut archived = item(ItemSpec {
        id: "w5",
        number: "104",
        board: "b1",
        parent: Some("F2"),
        root: Some("F1"),
        assignee: "ana",
        estimate_hours: Some(5.0),
        spent: 0,
    });
    archived.archived = true;

    let mut late = item(ItemSpec {
        id: "w6",
        number: "105",
        board: "b1",
        parent: Some("F2"),
        root: Some("F1"),
        assignee: "ana",
        estimate_hours: Some(1.0),
        spent: 100,
    });
    late.date_added = Some(at(2024, 3, 1));

    let entry = |id: &str, author: &str, number: &str, start: DateTime<Utc>, added: DateTime<Utc>, secs, manual| TimeEntry {
        id: id.into(),
        author: Some(author.into()),
        item_number: Some(number.into()),
        start_date: Some(start),
        length_seconds: secs,
        manual,
        date_added: Some(added),
        ..Default::default()
    };

    MemorySource {
        items: vec![checkout, refund, loose, pager, archived, late],
        entries: vec![
            entry("e1", "ana", "101", at(2024, 1, 4), at(2024, 1, 4), 3600, false),
            entry("e2", "bo", "102", at(2024, 1, 5), at(2024, 2, 10), 1800, true),
            entry("e3", "cy", "201", at(2024, 2, 15), at(2024, 2, 15), 900, false),
        ],
        boards: vec![
            Board {
                id: "b1".into(),
                label: "Core".into(),
            },
            Board {
                id: "b2".into(),
                label: "Ops".into(),
            },
        ],
        lanes: vec![label("l1", "In Progress"), label("l2", "Done")],
        work_types: vec![label("t1", "Feature"), label("t2", "Bug")],
        folders: vec![
            Folder::new("F1", "Platform", None),
            Folder::new("F2", "Payments", Some("F1")),
            Folder::new("F3", "Refunds", Some("F2")),
            Folder::new("F4", "Infra", None),
        ],
        ..Default::default()
    }
}

impl DataSource for MemorySource {
    fn capabilities(&self) -> &SchemaCapabilities {
        self.caps.as_ref().expect("capabilities set by store()")
    }

    fn work_items(&self) -> Result<Vec<WorkItem>> {
        self.item_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }

    fn time_entries(&self) -> Result<Vec<TimeEntry>> {
        Ok(self.entries.clone())
    }

    fn users(&self) -> Result<Vec<User>> {
        Ok(Vec::new())
    }

    fn work_types(&self) -> Result<Vec<Label>> {
        Ok(self.work_types.clone())
    }

    fn priorities(&self) -> Result<Vec<Label>> {
        Ok(Vec::new())
    }

    fn boards(&self) -> Result<Vec<Board>> {
        Ok(self.boards.clone())
    }

    fn lanes(&self) -> Result<Vec<Label>> {
        Ok(self.lanes.clone())
    }

    fn folders(&self) -> Result<Vec<Folder>> {
        Ok(self.folders.clone())
    }

    fn count_rows(&self, table: &str) -> Result<i64> {
        match table {
            "workitems" => Ok(self.items.len() as i64),
            other => Err(AnalyticsError::MissingTable(other.to_string())),
        }
    }

    fn schema_report(&self, _sample_rows: usize) -> Result<SchemaReport> {
        Ok(SchemaReport {
            generated_at: at(2024, 2, 1),
            sqlite_version: "memory".into(),
            tables: vec![TableReport {
                name: "workitems".into(),
                columns: Vec::new(),
                row_count: Some(self.items.len() as i64),
                sample_rows: Vec::new(),
                error: None,
            }],
        })
    }
}

fn store_with(mut source: MemorySource, mode: RefreshMode) -> (SnapshotStore, Arc<MemorySource>) {
    source.caps = Some(SchemaCapabilities {
        work_items: WorkItemShape::Basic,
        folders: FolderShape::Basic,
        org_scoped: BTreeSet::new(),
    });
    let source = Arc::new(source);
    let refresh = RefreshConfig {
        mode,
        ..Default::default()
    };
    let store = SnapshotStore::new(Arc::clone(&source) as Arc<dyn DataSource>, &refresh, 3);
    (store, source)
}

fn snapshot() -> Snapshot {
    store_with(fixture(), RefreshMode::Interval).0.snapshot().unwrap()
}

fn january() -> ReportFilter {
    ReportFilter::for_range(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
}

fn numbers(ctx: &ReportContext<'_>) -> Vec<String> {
    let mut numbers: Vec<String> = ctx.items.iter().map(|i| i.number.clone()).collect();
    numbers.sort();
    numbers
}

mod filters {
    use super::*;

    #[test]
    fn date_range_drops_archived_and_out_of_range() {
        let snapshot = snapshot();
        let filter = january();
        let ctx = ReportContext::new(&snapshot, &filter);
        assert_eq!(numbers(&ctx), vec!["101", "102", "103", "201"]);
        // e3 starts in February
        assert_eq!(ctx.entries.len(), 2);
    }

    #[test]
    fn list_filters_match_resolved_names() {
        let snapshot = snapshot();

        let mut filter = january();
        filter.boards = vec!["Ops".into()];
        assert_eq!(numbers(&ReportContext::new(&snapshot, &filter)), vec!["201"]);

        let mut filter = january();
        filter.work_types = vec!["Bug".into()];
        assert_eq!(numbers(&ReportContext::new(&snapshot, &filter)), vec!["102"]);

        let mut filter = january();
        filter.assignees = vec!["ana".into()];
        let ctx = ReportContext::new(&snapshot, &filter);
        assert_eq!(numbers(&ctx), vec!["101", "103"]);
        assert_eq!(ctx.entries.len(), 1);
    }

    #[test]
    fn params_resolve_from_query_values() {
        let snapshot = snapshot();
        let params = FilterParams {
            from: Some("2024-01-01".into()),
            to: Some("2024-01-31".into()),
            completion: Some("completed".into()),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let filter = params.resolve_for(&snapshot, today, 14).unwrap();
        assert_eq!(numbers(&ReportContext::new(&snapshot, &filter)), vec!["101"]);
    }

    #[test]
    fn missing_dates_fall_back_to_recent_data() {
        let snapshot = snapshot();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let filter = FilterParams::default().resolve_for(&snapshot, today, 14).unwrap();
        // The window ending last Sunday has no data, so the last 14 days of data are used
        assert_eq!(filter.end, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(filter.start, NaiveDate::from_ymd_opt(2024, 2, 16).unwrap());
    }
}

mod metrics {
    use super::*;

    #[test]
    fn key_metrics_over_january() {
        let snapshot = snapshot();
        let filter = january();
        let metrics = key_metrics(&ReportContext::new(&snapshot, &filter));
        assert_eq!(metrics.total_items, 4);
        assert_eq!(metrics.completed, 1);
        assert_eq!(metrics.in_progress, 3);
        assert_eq!(metrics.time_tracked_seconds, 15_000);
        assert_eq!(metrics.active_users, 3);
    }

    #[test]
    fn time_report_splits_entries() {
        let snapshot = snapshot();
        let filter = january();
        let report = time_report(&ReportContext::new(&snapshot, &filter), 2);
        assert_eq!(report.by_user, vec![("ana".to_string(), 3600), ("bo".to_string(), 1800)]);
        assert_eq!(report.manual_entries, 1);
        assert_eq!(report.automatic_entries, 1);
        let top: Vec<&str> = report.top_items.iter().map(|t| t.number.as_str()).collect();
        assert_eq!(top, vec!["101", "201"]);
    }

    #[test]
    fn team_report_per_assignee() {
        let snapshot = snapshot();
        let filter = january();
        let report = team_report(&ReportContext::new(&snapshot, &filter), 15);
        assert_eq!(report.items_by_assignee[0], ("ana".to_string(), 2));
        let ana = &report.users[0];
        assert_eq!(ana.username, "ana");
        assert_eq!(ana.completed, 1);
        assert_eq!(ana.completion_rate, 50.0);
        assert_eq!(ana.time_spent_seconds, 9600);
    }
}

mod budget {
    use super::*;

    #[test]
    fn overview_totals_and_board_status() {
        let snapshot = snapshot();
        let filter = january();
        let overview = budget_overview(&ReportContext::new(&snapshot, &filter));

        assert_eq!(overview.totals.items, 4);
        assert_eq!(overview.totals.estimated_seconds, 14_400);
        assert_eq!(overview.totals.actual_seconds, 15_000);
        assert_eq!(overview.totals.variance_seconds, 600);
        assert_eq!(overview.totals.with_estimates, 3);

        assert_eq!(overview.boards.len(), 2);
        assert_eq!(overview.boards[0].board, "Core");
        assert_eq!(overview.boards[0].status, BudgetStatus::OverBudget);
        assert_eq!(overview.boards[1].board, "Ops");
        assert_eq!(overview.boards[1].status, BudgetStatus::OnTarget);
    }

    #[test]
    fn drilldown_groups_by_root_folder() {
        let snapshot = snapshot();
        let filter = january();
        let drill = board_drilldown(&ReportContext::new(&snapshot, &filter), "Core", 10);

        assert_eq!(drill.totals.items, 3);
        assert_eq!(drill.folder_count, 1);
        let groups: Vec<(&str, usize)> = drill.groups.iter().map(|g| (g.folder.as_str(), g.totals.items)).collect();
        assert_eq!(groups, vec![(NO_FOLDER, 1), ("Platform", 2)]);

        let types: Vec<&str> = drill.by_work_type.iter().map(|t| t.work_type.as_str()).collect();
        assert_eq!(types, vec!["Bug", "Feature"]);

        // 101 is 30m over, 102 is 30m under; equal magnitude sorts by number
        let top: Vec<&str> = drill.top_variances.iter().map(|l| l.number.as_str()).collect();
        assert_eq!(top, vec!["101", "102"]);
        assert!((drill.completion_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_board_is_rejected() {
        let snapshot = snapshot();
        let filter = january();
        let ctx = ReportContext::new(&snapshot, &filter);
        assert!(ctx.require_board("Core").is_ok());
        assert!(matches!(ctx.require_board("Nope"), Err(AnalyticsError::BoardNotFound(_))));
    }
}

mod value_streams {
    use super::*;

    #[test]
    fn streams_roll_items_up_the_tree() {
        let snapshot = snapshot();
        let filter = january();
        let streams = value_streams(&ReportContext::new(&snapshot, &filter), "Core", HomeFolderRule::ParentOrRoot);

        assert_eq!(streams.totals.items, 3);
        assert_eq!(streams.unplaced, 1);
        // Infra holds nothing on this board
        assert_eq!(streams.streams.len(), 1);

        let platform = &streams.streams[0];
        assert_eq!(platform.title, "Platform");
        assert_eq!(platform.direct.items, 0);
        assert_eq!(platform.total.items, 2);
        assert_eq!(platform.total.actual_seconds, 10_800);

        let payments = &platform.children[0];
        assert_eq!(payments.path, vec!["Platform", "Payments"]);
        assert_eq!(payments.direct.items, 1);
        assert_eq!(payments.total.items, 2);
        assert_eq!(payments.child_titles, vec!["Refunds"]);
        assert_eq!(payments.children[0].direct_items[0].number, "102");
    }

    #[test]
    fn search_finds_folders_with_items() {
        let snapshot = snapshot();
        let filter = january();
        let ctx = ReportContext::new(&snapshot, &filter);

        let hits = search_streams(&ctx, "Core", "PAY", HomeFolderRule::ParentOrRoot);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "Platform > Payments");
        assert_eq!(hits[0].total.items, 2);

        assert!(search_streams(&ctx, "Core", "infra", HomeFolderRule::ParentOrRoot).is_empty());
        assert_eq!(search_streams(&ctx, "Ops", "infra", HomeFolderRule::ParentOrRoot).len(), 1);
    }
}

mod stale {
    use super::*;

    #[test]
    fn quiet_items_outside_terminal_lanes() {
        let snapshot = snapshot();
        let filter = january();
        let lanes = ReportsConfig::default().terminal_lanes().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 9, 0, 0).unwrap();
        let report = stale_report(&ReportContext::new(&snapshot, &filter), 14, &lanes, now);

        // 101 is Done, 102 and 201 have entries added after the cutoff
        let stale: Vec<&str> = report.items.iter().map(|i| i.number.as_str()).collect();
        assert_eq!(stale, vec!["103"]);
        assert_eq!(report.items[0].days_stale, 26);
        assert_eq!(report.oldest_days, 26);
        assert_eq!(report.affected_assignees, 1);
        assert_eq!(report.by_board, vec![("Core".to_string(), 1)]);
    }

    #[test]
    fn terminal_lanes_come_from_the_pattern() {
        let snapshot = snapshot();
        let filter = january();
        let lanes = regex_lite::Regex::new("(?i)icebox").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 9, 0, 0).unwrap();
        let report = stale_report(&ReportContext::new(&snapshot, &filter), 14, &lanes, now);

        // Done is no longer terminal, so 101 shows up as the oldest
        let stale: Vec<&str> = report.items.iter().map(|i| i.number.as_str()).collect();
        assert_eq!(stale, vec!["101", "103"]);
        assert_eq!(report.oldest_days, 36);
        assert_eq!(report.affected_assignees, 1);
    }
}

mod store_and_export {
    use super::*;

    fn january_params() -> FilterParams {
        FilterParams {
            from: Some("2024-01-01".into()),
            to: Some("2024-01-31".into()),
            ..Default::default()
        }
    }

    #[test]
    fn manual_mode_reloads_only_on_refresh() {
        let (store, source) = store_with(fixture(), RefreshMode::Manual);
        store.snapshot().unwrap();
        store.snapshot().unwrap();
        assert_eq!(source.item_loads.load(Ordering::SeqCst), 1);

        store.refresh();
        store.snapshot().unwrap();
        assert_eq!(source.item_loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn budget_csv_has_one_row_per_item() {
        let (store, _) = store_with(fixture(), RefreshMode::Interval);
        let bytes = render_report(
            &store,
            ReportKind::Budget,
            &january_params(),
            &ReportsConfig::default(),
            at(2024, 2, 15),
        )
        .unwrap();
        let csv = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Number,Title,Board,Type,Assignee"));
        assert!(csv.contains("101,Item 101,Core,Feature,ana,2h 0m,2h 30m,0h 30m,+25.0%"));
    }

    #[test]
    fn basic_table_has_no_extended_columns() {
        let (store, _) = store_with(fixture(), RefreshMode::Interval);
        let bytes = render_report(
            &store,
            ReportKind::Table,
            &january_params(),
            &ReportsConfig::default(),
            at(2024, 2, 15),
        )
        .unwrap();
        let csv = String::from_utf8(bytes).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("Number,Title,Assignee,Board,Lane"));
        assert!(!header.contains("Tags"));
    }

    #[test]
    fn schema_export_is_json() {
        let (store, _) = store_with(fixture(), RefreshMode::Interval);
        let bytes = render_report(
            &store,
            ReportKind::Schema,
            &FilterParams::default(),
            &ReportsConfig::default(),
            at(2024, 2, 15),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["tables"][0]["name"], "workitems");
        assert_eq!(json["tables"][0]["row_count"], 6);
    }

    #[test]
    fn bad_dates_are_filter_errors() {
        let (store, _) = store_with(fixture(), RefreshMode::Interval);
        let params = FilterParams {
            from: Some("2024-02-01".into()),
            to: Some("2024-01-01".into()),
            ..Default::default()
        };
        let err = render_report(&store, ReportKind::Stale, &params, &ReportsConfig::default(), at(2024, 2, 15))
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
