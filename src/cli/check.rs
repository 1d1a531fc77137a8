//! Smoke test for a data source.
//!
//! Runs the same reads the dashboard needs, one step at a time, and stops
//! at the first failure.

use crate::db::DataSource;
use crate::error::Result;
use crate::types::Label;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckStep {
    pub name: String,
    pub summary: String,
    /// Detail lines, e.g. one per lookup row.
    pub details: Vec<String>,
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub steps: Vec<CheckStep>,
    /// Name of the failed step and its error.
    pub failure: Option<(String, String)>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    fn record(&mut self, name: &str, outcome: Result<(String, Vec<String>)>) -> bool {
        match outcome {
            Ok((summary, details)) => {
                self.steps.push(CheckStep {
                    name: name.to_string(),
                    summary,
                    details,
                });
                true
            }
            Err(e) => {
                self.failure = Some((name.to_string(), e.to_string()));
                false
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, step.name);
            let _ = writeln!(out, "   ok: {}", step.summary);
            for line in &step.details {
                let _ = writeln!(out, "      - {}", line);
            }
        }
        match &self.failure {
            None => out.push_str("\nAll checks passed\n"),
            Some((name, error)) => {
                let _ = writeln!(out, "{}. {}", self.steps.len() + 1, name);
                let _ = writeln!(out, "   FAILED: {}", error);
            }
        }
        out
    }
}

fn count(source: &dyn DataSource, table: &str, noun: &str) -> Result<(String, Vec<String>)> {
    let n = source.count_rows(table)?;
    Ok((format!("found {} {}", n, noun), Vec::new()))
}

fn labels(rows: Result<Vec<Label>>, noun: &str) -> Result<(String, Vec<String>)> {
    let rows = rows?;
    let details = rows
        .iter()
        .map(|l| format!("{} ({})", l.name, l.color.as_deref().unwrap_or("no color")))
        .collect();
    Ok((format!("found {} {}", rows.len(), noun), details))
}

pub fn run_check(source: &dyn DataSource) -> CheckReport {
    let mut report = CheckReport::default();
    let caps = source.capabilities();
    report.record(
        "Inspect schema",
        Ok((
            format!("work items {:?}, folders {:?}", caps.work_items, caps.folders),
            Vec::new(),
        )),
    );

    let _ = report.record("Count work items", count(source, "workitems", "work items"))
        && report.record("Count time entries", count(source, "time_entries", "time entries"))
        && report.record("Count users", count(source, "users", "users"))
        && report.record("List work types", labels(source.work_types(), "work types"))
        && report.record("List priorities", labels(source.priorities(), "priorities"))
        && report.record(
            "Count boards",
            source.boards().map(|b| (format!("found {} boards", b.len()), Vec::new())),
        )
        && report.record("List lanes", labels(source.lanes(), "lanes"));

    report
}
