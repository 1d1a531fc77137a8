//! Page bodies. Each function turns one report into an HTML fragment that
//! the server drops into the base template.

use super::html::{bar_chart, completion_bar, count_rows, empty_state, escape, stat_cards, table};
use crate::db::{SchemaReport, WorkItemShape};
use crate::error::Result;
use crate::format::{format_date, format_datetime, format_duration, format_seconds, format_variance, hours};
use crate::hierarchy::HomeFolderRule;
use crate::report::budget::{BudgetStatus, BudgetTotals, board_drilldown, budget_overview};
use crate::report::metrics::{key_metrics, overview, team_report, time_report};
use crate::report::stale::stale_report;
use crate::report::table::{budget_table, item_table, stale_table};
use crate::report::value_stream::{ValueStreamNode, search_streams, value_streams};
use crate::report::{DataTable, FilterParams, ReportContext, tally};
use chrono::{DateTime, NaiveDate, Utc};
use regex_lite::Regex;
use std::fmt::Write;

const DURATION_COLUMNS: &[&str] = &["Estimated", "Actual", "Variance", "Variance %", "Items", "Days Stale"];

fn hours_label(value: f64) -> String {
    format!("{:.1}h", value)
}

fn count_label(value: f64) -> String {
    format!("{}", value as i64)
}

fn per_day(rows: &[(NaiveDate, i64)], scale: fn(i64) -> f64) -> Vec<(String, f64)> {
    rows.iter()
        .map(|(day, n)| (day.format("%Y-%m-%d").to_string(), scale(*n)))
        .collect()
}

fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else if path.contains('?') {
        format!("{}&{}", path, query)
    } else {
        format!("{}?{}", path, query)
    }
}

fn download_link(path: &str, query: &str, label: &str) -> String {
    format!(
        r#"<div class="actions"><a class="button" href="{}">{}</a></div>"#,
        escape(&with_query(path, query)),
        escape(label)
    )
}

fn card(title: &str, body: &str) -> String {
    format!(r#"<div class="card"><h2>{}</h2>{}</div>"#, escape(title), body)
}

fn variance_class(variance: i64) -> Option<&'static str> {
    match BudgetStatus::from_variance(variance) {
        BudgetStatus::OverBudget => Some("over"),
        BudgetStatus::UnderBudget => Some("under"),
        BudgetStatus::OnTarget => None,
    }
}

fn budget_cards(totals: &BudgetTotals) -> String {
    stat_cards(&[
        ("Estimated", format_duration(totals.estimated_seconds), None),
        ("Actual", format_duration(totals.actual_seconds), None),
        ("Variance", format_duration(totals.variance_seconds), variance_class(totals.variance_seconds)),
        ("Variance %", format_variance(totals.variance_percent), variance_class(totals.variance_seconds)),
        (
            "Items with Estimates",
            format!("{} / {}", totals.with_estimates, totals.items),
            None,
        ),
    ])
}

pub fn overview_page(ctx: &ReportContext<'_>) -> String {
    let metrics = key_metrics(ctx);
    let overview = overview(ctx);

    let mut html = stat_cards(&[
        ("Total Items", metrics.total_items.to_string(), None),
        ("Completed", metrics.completed.to_string(), None),
        ("In Progress", metrics.in_progress.to_string(), None),
        ("Time Tracked", format_duration(metrics.time_tracked_seconds), None),
        ("Active Users", metrics.active_users.to_string(), None),
    ]);
    html.push_str(r#"<div class="grid grid-2">"#);
    html.push_str(&card("Completion", &completion_bar(overview.completed, overview.in_progress)));
    html.push_str(&card(
        "Items by Work Type",
        &bar_chart(&count_rows(&overview.by_work_type), count_label),
    ));
    html.push_str(&card(
        "Items Created per Day",
        &bar_chart(&per_day(&overview.created_per_day, |n| n as f64), count_label),
    ));
    html.push_str(&card(
        "Items by Priority",
        &bar_chart(&count_rows(&overview.by_priority), count_label),
    ));
    html.push_str("</div>");
    html
}

pub fn time_page(ctx: &ReportContext<'_>, top_n: usize) -> String {
    let report = time_report(ctx, top_n);
    let logged: i64 = report.by_user.iter().map(|(_, s)| s).sum();

    let mut html = stat_cards(&[
        ("Time Logged", format_duration(logged), None),
        ("Entries", ctx.entries.len().to_string(), None),
        ("Manual", report.manual_entries.to_string(), None),
        ("Automatic", report.automatic_entries.to_string(), None),
    ]);

    let by_user: Vec<(String, f64)> = report.by_user.iter().map(|(u, s)| (u.clone(), hours(*s))).collect();
    html.push_str(r#"<div class="grid grid-2">"#);
    html.push_str(&card("Hours by User", &bar_chart(&by_user, hours_label)));
    html.push_str(&card("Hours per Day", &bar_chart(&per_day(&report.per_day, hours), hours_label)));
    html.push_str("</div>");

    let mut leaders = DataTable::new(["Number", "Title", "Assignee", "Time Spent"]);
    for item in &report.top_items {
        leaders.push(vec![
            item.number.clone(),
            item.title.clone(),
            item.assignee.clone().unwrap_or_default(),
            format_seconds(item.time_spent_seconds),
        ]);
    }
    html.push_str(&format!("<h2>Top {} Items by Time Spent</h2>", top_n));
    html.push_str(&table(&leaders, &["Time Spent"]));
    html
}

pub fn team_page(ctx: &ReportContext<'_>, leaderboard_size: usize) -> String {
    let report = team_report(ctx, leaderboard_size);

    let mut html = String::from(r#"<div class="grid grid-2">"#);
    html.push_str(&card(
        "Items per Assignee",
        &bar_chart(&count_rows(&report.items_by_assignee), count_label),
    ));
    html.push_str(&card(
        "Completed per Assignee",
        &bar_chart(&count_rows(&report.completed_by_assignee), count_label),
    ));
    html.push_str("</div>");

    let mut users = DataTable::new(["User", "Total", "Completed", "In Progress", "Completion Rate", "Time Spent"]);
    for user in &report.users {
        users.push(vec![
            user.username.clone(),
            user.total.to_string(),
            user.completed.to_string(),
            user.in_progress.to_string(),
            format!("{:.1}%", user.completion_rate),
            format_duration(user.time_spent_seconds),
        ]);
    }
    html.push_str("<h2>Team Summary</h2>");
    html.push_str(&table(
        &users,
        &["Total", "Completed", "In Progress", "Completion Rate", "Time Spent"],
    ));
    html
}

pub fn budget_page(ctx: &ReportContext<'_>, query: &str) -> String {
    let overview = budget_overview(ctx);
    let mut html = budget_cards(&overview.totals);

    html.push_str("<h2>By Board</h2>");
    if overview.boards.is_empty() {
        html.push_str(&empty_state("No items on a known board"));
    } else {
        html.push_str(
            r#"<div class="table-scroll"><table><thead><tr><th>Board</th><th class="number">Items</th><th class="number">Estimated</th><th class="number">Actual</th><th class="number">Variance</th><th class="number">Variance %</th><th>Status</th></tr></thead><tbody>"#,
        );
        for row in &overview.boards {
            let href = with_query(&format!("/budget/board?board={}", urlencoding::encode(&row.board)), query);
            let _ = write!(
                html,
                r#"<tr><td><a href="{}">{}</a></td><td class="number">{}</td><td class="number">{}</td><td class="number">{}</td><td class="number">{}</td><td class="number">{}</td><td><span class="badge badge-{}">{}</span></td></tr>"#,
                escape(&href),
                escape(&row.board),
                row.totals.items,
                format_duration(row.totals.estimated_seconds),
                format_duration(row.totals.actual_seconds),
                format_duration(row.totals.variance_seconds),
                format_variance(row.totals.variance_percent),
                match row.status {
                    BudgetStatus::OverBudget => "over_budget",
                    BudgetStatus::UnderBudget => "under_budget",
                    BudgetStatus::OnTarget => "on_target",
                },
                row.status.label()
            );
        }
        html.push_str("</tbody></table></div>");
    }

    html.push_str("<h2>All Items</h2>");
    html.push_str(&download_link("/export/budget.csv", query, "Download CSV"));
    html.push_str(&table(&budget_table(&overview.lines), DURATION_COLUMNS));
    html
}

pub fn board_page(ctx: &ReportContext<'_>, board: &str, top_n: usize) -> Result<String> {
    ctx.require_board(board)?;
    let drill = board_drilldown(ctx, board, top_n);

    let mut html = stat_cards(&[
        ("Items", drill.totals.items.to_string(), None),
        ("Folders", drill.folder_count.to_string(), None),
        ("Completion Rate", format!("{:.1}%", drill.completion_rate), None),
    ]);
    html.push_str(&budget_cards(&drill.totals));

    let mut types = DataTable::new(["Work Type", "Items", "Estimated", "Actual", "Variance", "Variance %"]);
    for row in &drill.by_work_type {
        types.push(vec![
            row.work_type.clone(),
            row.totals.items.to_string(),
            format_duration(row.totals.estimated_seconds),
            format_duration(row.totals.actual_seconds),
            format_duration(row.totals.variance_seconds),
            format_variance(row.totals.variance_percent),
        ]);
    }
    html.push_str("<h2>By Work Type</h2>");
    html.push_str(&table(&types, DURATION_COLUMNS));

    html.push_str(&format!("<h2>Top {} Variances</h2>", top_n));
    html.push_str(&table(&budget_table(&drill.top_variances), DURATION_COLUMNS));

    html.push_str("<h2>By Folder</h2>");
    for group in &drill.groups {
        let _ = write!(
            html,
            r#"<h3>{} <span class="muted">{} items, {} estimated, {} actual, {}</span></h3>"#,
            escape(&group.folder),
            group.totals.items,
            format_duration(group.totals.estimated_seconds),
            format_duration(group.totals.actual_seconds),
            format_variance(group.totals.variance_percent)
        );
        html.push_str(&table(&budget_table(&group.lines), DURATION_COLUMNS));
    }
    Ok(html)
}

fn board_picker(ctx: &ReportContext<'_>, base: &str, query: &str) -> String {
    let boards = tally(ctx.items.iter().filter_map(|item| ctx.lookups.board(item)));
    if boards.is_empty() {
        return empty_state("No items on a known board for the selected filters");
    }
    let mut html = String::from(r#"<div class="card"><h2>Choose a Board</h2><ul>"#);
    for (board, count) in &boards {
        let href = with_query(&format!("{}?board={}", base, urlencoding::encode(board)), query);
        let _ = write!(
            html,
            r#"<li><a href="{}">{}</a> <span class="muted">({} items)</span></li>"#,
            escape(&href),
            escape(board),
            count
        );
    }
    html.push_str("</ul></div>");
    html
}

pub fn board_picker_page(ctx: &ReportContext<'_>, query: &str) -> String {
    board_picker(ctx, "/budget/board", query)
}

fn totals_summary(totals: &BudgetTotals) -> String {
    format!(
        "{} items, {} est, {} actual, {}",
        totals.items,
        format_duration(totals.estimated_seconds),
        format_duration(totals.actual_seconds),
        format_variance(totals.variance_percent)
    )
}

fn stream_node(node: &ValueStreamNode, out: &mut String) {
    let _ = write!(
        out,
        r#"<details class="stream"{}><summary><strong>{}</strong> <span class="muted">level {}, {} direct / {} total items</span></summary><div class="path">{}</div><div class="muted">Direct: {}</div><div class="muted">Total: {}</div>"#,
        if node.level == 0 { " open" } else { "" },
        escape(&node.title),
        node.level,
        node.direct.items,
        node.total.items,
        escape(&node.path_label()),
        totals_summary(&node.direct),
        totals_summary(&node.total)
    );
    if !node.child_titles.is_empty() {
        let _ = write!(
            out,
            r#"<div class="muted">Children: {}</div>"#,
            escape(&node.child_titles.join(", "))
        );
    }
    if !node.direct_items.is_empty() {
        out.push_str(&table(&budget_table(&node.direct_items), DURATION_COLUMNS));
    }
    for child in &node.children {
        stream_node(child, out);
    }
    out.push_str("</details>");
}

fn hidden_filter_fields(filter_query: &FilterParams) -> String {
    let fields = [
        ("from", &filter_query.from),
        ("to", &filter_query.to),
        ("assignees", &filter_query.assignees),
        ("authors", &filter_query.authors),
        ("work_types", &filter_query.work_types),
        ("priorities", &filter_query.priorities),
        ("boards", &filter_query.boards),
        ("lanes", &filter_query.lanes),
        ("completion", &filter_query.completion),
    ];
    fields
        .iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .map(|v| format!(r#"<input type="hidden" name="{}" value="{}">"#, name, escape(v)))
        })
        .collect()
}

pub fn value_streams_page(
    ctx: &ReportContext<'_>,
    board: Option<&str>,
    search: Option<&str>,
    rule: HomeFolderRule,
    query: &str,
) -> Result<String> {
    let Some(board) = board else {
        return Ok(board_picker(ctx, "/value-streams", query));
    };
    ctx.require_board(board)?;
    let streams = value_streams(ctx, board, rule);

    let mut html = stat_cards(&[
        ("Board", board.to_string(), None),
        ("Items", streams.totals.items.to_string(), None),
        ("Value Streams", streams.streams.len().to_string(), None),
        ("Outside Known Folders", streams.unplaced.to_string(), None),
    ]);

    let search_text = search.unwrap_or_default();
    let _ = write!(
        html,
        r#"<div class="card filters"><form method="get" action="/value-streams"><input type="hidden" name="board" value="{}">{}<label>Search folders<input name="search" value="{}"></label><button type="submit">Search</button></form></div>"#,
        escape(board),
        hidden_filter_fields(&FilterParams::from_filter(ctx.filter)),
        escape(search_text)
    );

    if !search_text.trim().is_empty() {
        let hits = search_streams(ctx, board, search_text, rule);
        let mut rows = DataTable::new(["Folder", "Path", "Level", "Items", "Estimated", "Actual", "Variance %"]);
        for hit in &hits {
            rows.push(vec![
                hit.title.clone(),
                hit.path.clone(),
                hit.level.to_string(),
                hit.total.items.to_string(),
                format_duration(hit.total.estimated_seconds),
                format_duration(hit.total.actual_seconds),
                format_variance(hit.total.variance_percent),
            ]);
        }
        let _ = write!(html, "<h2>Folders matching \"{}\"</h2>", escape(search_text));
        html.push_str(&table(&rows, &["Level", "Items", "Estimated", "Actual", "Variance %"]));
    }

    html.push_str("<h2>Streams</h2>");
    if streams.streams.is_empty() {
        html.push_str(&empty_state("No folders hold items from this board"));
    }
    for node in &streams.streams {
        stream_node(node, &mut html);
    }
    Ok(html)
}

pub fn stale_page(
    ctx: &ReportContext<'_>,
    stale_days: i64,
    terminal_lanes: &Regex,
    now: DateTime<Utc>,
    query: &str,
) -> String {
    let report = stale_report(ctx, stale_days, terminal_lanes, now);

    let mut html = stat_cards(&[
        ("Stale Items", report.total().to_string(), None),
        ("Oldest (days)", report.oldest_days.to_string(), None),
        ("Assignees", report.affected_assignees.to_string(), None),
        ("Boards", report.affected_boards.to_string(), None),
    ]);
    let _ = write!(
        html,
        r#"<p class="muted">Not updated and without time logged since {} ({} days).</p>"#,
        format_datetime(Some(report.cutoff)),
        report.stale_days
    );
    html.push_str(&card("Stale Items by Board", &bar_chart(&count_rows(&report.by_board), count_label)));
    html.push_str(&download_link("/export/stale.csv", query, "Download CSV"));
    html.push_str(&table(&stale_table(&report), DURATION_COLUMNS));
    html
}

pub fn table_page(ctx: &ReportContext<'_>, shape: WorkItemShape, query: &str) -> String {
    let data = item_table(ctx, shape);
    let mut html = format!(r#"<p class="muted">{} items</p>"#, data.len());
    html.push_str(&download_link("/export/table.csv", query, "Download CSV"));
    html.push_str(&table(&data, &["Time Spent"]));
    html
}

pub fn schema_page(report: &SchemaReport) -> String {
    let mut html = format!(
        r#"<p class="muted">SQLite {}, generated {}</p>"#,
        escape(&report.sqlite_version),
        format_date(Some(report.generated_at))
    );
    html.push_str(&download_link("/export/schema.json", "", "Download JSON"));

    for t in &report.tables {
        let rows = t
            .row_count
            .map(|n| format!("{} rows", n))
            .unwrap_or_else(|| "row count unavailable".to_string());
        let _ = write!(
            html,
            r#"<div class="card"><h2>{} <span class="muted">{}</span></h2>"#,
            escape(&t.name),
            rows
        );
        if let Some(error) = &t.error {
            html.push_str(&super::html::error_message(error));
        }

        let mut columns = DataTable::new(["Column", "Type", "Nullable", "Primary Key"]);
        for c in &t.columns {
            columns.push(vec![
                c.name.clone(),
                c.data_type.clone(),
                (if c.nullable { "yes" } else { "no" }).to_string(),
                (if c.primary_key { "yes" } else { "" }).to_string(),
            ]);
        }
        html.push_str(&table(&columns, &[]));

        if !t.sample_rows.is_empty() {
            let mut sample = DataTable::new(t.columns.iter().map(|c| c.name.clone()));
            for row in &t.sample_rows {
                sample.push(row.clone());
            }
            html.push_str("<h3>Sample Rows</h3>");
            html.push_str(&table(&sample, &[]));
        }
        html.push_str("</div>");
    }
    html
}
