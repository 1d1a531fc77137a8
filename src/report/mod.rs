//! Report computations.
//!
//! Every report is a pure function of a [`ReportContext`]: a snapshot, its
//! lookups and the filtered items and entries. Rendering lives elsewhere.

pub mod budget;
pub mod export;
pub mod filters;
pub mod metrics;
pub mod stale;
pub mod table;
pub mod value_stream;

pub use filters::{CompletionFilter, FilterOptions, FilterParams, ReportFilter};
pub use table::DataTable;

use crate::error::{AnalyticsError, Result};
use crate::snapshot::{Lookups, Snapshot};
use crate::types::{TimeEntry, WorkItem};
use std::collections::HashMap;

/// Filtered view of one snapshot.
pub struct ReportContext<'a> {
    pub snapshot: &'a Snapshot,
    pub lookups: Lookups<'a>,
    pub filter: &'a ReportFilter,
    pub items: Vec<&'a WorkItem>,
    pub entries: Vec<&'a TimeEntry>,
}

impl<'a> ReportContext<'a> {
    pub fn new(snapshot: &'a Snapshot, filter: &'a ReportFilter) -> Self {
        let lookups = snapshot.lookups();
        let items = snapshot
            .work_items()
            .iter()
            .filter(|item| filter.matches_item(item, &lookups))
            .collect();
        let entries = snapshot
            .time_entries()
            .iter()
            .filter(|entry| filter.matches_entry(entry))
            .collect();
        Self {
            snapshot,
            lookups,
            filter,
            items,
            entries,
        }
    }

    /// Filtered items on the board with this label.
    pub fn board_items(&self, board: &str) -> Vec<&'a WorkItem> {
        self.items
            .iter()
            .copied()
            .filter(|item| self.lookups.board(item) == Some(board))
            .collect()
    }

    /// Fails unless a board with this label exists in the snapshot.
    pub fn require_board(&self, board: &str) -> Result<()> {
        if self.snapshot.reference.boards.iter().any(|b| b.label == board) {
            Ok(())
        } else {
            Err(AnalyticsError::BoardNotFound(board.to_string()))
        }
    }
}

/// Count occurrences per label, highest first, ties by label.
pub fn tally<'a, I>(labels: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    sort_desc(counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Sum values per label, highest first, ties by label.
pub fn sum_by<'a, I>(pairs: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut sums: HashMap<&str, i64> = HashMap::new();
    for (label, value) in pairs {
        *sums.entry(label).or_default() += value;
    }
    sort_desc(sums.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn sort_desc(mut rows: Vec<(String, i64)>) -> Vec<(String, i64)> {
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Completed share in percent; zero when there is nothing to complete.
pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}
