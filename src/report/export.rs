//! Downloadable report formats: CSV tables and the JSON schema report.

use super::budget::budget_lines;
use super::stale::stale_report;
use super::table::{budget_table, item_table, stale_table};
use super::{DataTable, FilterParams, ReportContext};
use crate::config::ReportsConfig;
use crate::db::SchemaReport;
use crate::error::{AnalyticsError, Result};
use crate::snapshot::SnapshotStore;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Reports available as downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Table,
    Budget,
    Stale,
    Schema,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [Self::Table, Self::Budget, Self::Stale, Self::Schema];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Budget => "budget",
            Self::Stale => "stale",
            Self::Schema => "schema",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Table => "table.csv",
            Self::Budget => "budget.csv",
            Self::Stale => "stale.csv",
            Self::Schema => "schema.json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Schema => "application/json",
            _ => "text/csv; charset=utf-8",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| AnalyticsError::UnknownReport(s.to_string()))
    }
}

pub fn write_csv<W: Write>(table: &DataTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&table.columns)?;
    for row in &table.rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn csv_bytes(table: &DataTable) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_csv(table, &mut out)?;
    Ok(out)
}

pub fn schema_json(report: &SchemaReport) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(report)?)
}

pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Render a download the same way for the CLI and the dashboard.
pub fn render_report(
    store: &SnapshotStore,
    kind: ReportKind,
    params: &FilterParams,
    reports: &ReportsConfig,
    now: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let table = match kind {
        ReportKind::Schema => {
            let report = store.schema_report()?;
            return schema_json(&report);
        }
        ReportKind::Table | ReportKind::Budget | ReportKind::Stale => {
            report_table(store, kind, params, reports, now)?
        }
    };
    tracing::debug!(report = %kind, rows = table.len(), "rendered export");
    csv_bytes(&table)
}

fn report_table(
    store: &SnapshotStore,
    kind: ReportKind,
    params: &FilterParams,
    reports: &ReportsConfig,
    now: DateTime<Utc>,
) -> Result<DataTable> {
    let snapshot = store.snapshot()?;
    let filter = params.resolve_for(&snapshot, now.date_naive(), reports.default_window_days)?;
    let ctx = ReportContext::new(&snapshot, &filter);
    Ok(match kind {
        ReportKind::Table => item_table(&ctx, store.source().capabilities().work_items),
        ReportKind::Budget => budget_table(&budget_lines(&ctx)),
        _ => stale_table(&stale_report(&ctx, reports.stale_days, &reports.terminal_lanes()?, now)),
    })
}
