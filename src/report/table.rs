//! Row/column views shared by HTML tables and CSV downloads.

use super::ReportContext;
use super::budget::BudgetLine;
use super::stale::StaleReport;
use crate::db::WorkItemShape;
use crate::format::{format_date, format_datetime, format_duration, format_json_field, format_seconds, format_variance};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// Filtered work items with resolved names. Tags and custom fields are
/// included when the source has those columns.
pub fn item_table(ctx: &ReportContext<'_>, shape: WorkItemShape) -> DataTable {
    let mut columns = vec![
        "Number",
        "Title",
        "Assignee",
        "Board",
        "Lane",
        "Type",
        "Priority",
        "Time Spent",
        "Completed At",
        "Date Added",
        "Last Updated",
    ];
    let extended = shape == WorkItemShape::Extended;
    if extended {
        columns.extend(["Tags", "Custom Fields"]);
    }

    let mut table = DataTable::new(columns);
    for item in &ctx.items {
        let mut row = vec![
            item.number.clone(),
            item.title.clone(),
            text(item.assignee.as_deref()),
            text(ctx.lookups.board(item)),
            text(ctx.lookups.lane(item)),
            text(ctx.lookups.work_type(item)),
            text(ctx.lookups.priority(item)),
            format_seconds(item.time_spent()),
            format_datetime(item.completed_at),
            format_datetime(item.date_added),
            format_datetime(item.date_updated),
        ];
        if extended {
            row.push(format_json_field(item.tags.as_deref()));
            row.push(format_json_field(item.custom_fields.as_deref()));
        }
        table.push(row);
    }
    table
}

pub fn budget_table<'l>(lines: impl IntoIterator<Item = &'l BudgetLine>) -> DataTable {
    let mut table = DataTable::new([
        "Number",
        "Title",
        "Board",
        "Type",
        "Assignee",
        "Estimated",
        "Actual",
        "Variance",
        "Variance %",
        "Last Updated",
    ]);
    for line in lines {
        table.push(vec![
            line.number.clone(),
            line.title.clone(),
            text(line.board.as_deref()),
            text(line.work_type.as_deref()),
            text(line.assignee.as_deref()),
            format_duration(line.estimated_seconds),
            format_duration(line.actual_seconds),
            format_duration(line.variance_seconds),
            format_variance(line.variance_percent),
            format_datetime(line.date_updated),
        ]);
    }
    table
}

pub fn stale_table(report: &StaleReport) -> DataTable {
    let mut table = DataTable::new(["Number", "Title", "Assignee", "Board", "Lane", "Last Updated", "Days Stale"]);
    for item in &report.items {
        table.push(vec![
            item.number.clone(),
            item.title.clone(),
            text(item.assignee.as_deref()),
            text(item.board.as_deref()),
            text(item.lane.as_deref()),
            format_date(Some(item.date_updated)),
            item.days_stale.to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_table_formats_durations() {
        let line = BudgetLine {
            number: "42".into(),
            title: "Login".into(),
            board: Some("Core".into()),
            work_type: None,
            assignee: Some("ana".into()),
            completed: false,
            estimated_seconds: 3600,
            actual_seconds: 5400,
            variance_seconds: 1800,
            variance_percent: 50.0,
            date_updated: None,
        };
        let table = budget_table([&line]);
        assert_eq!(table.columns.len(), 10);
        assert_eq!(
            table.rows[0],
            vec!["42", "Login", "Core", "", "ana", "1h 0m", "1h 30m", "0h 30m", "+50.0%", ""]
        );
    }
}
