//! Active items that have gone quiet.

use super::{ReportContext, tally};
use chrono::{DateTime, Duration, Utc};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleItem {
    pub number: String,
    pub title: String,
    pub assignee: Option<String>,
    pub board: Option<String>,
    pub lane: Option<String>,
    pub date_updated: DateTime<Utc>,
    pub days_stale: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleReport {
    pub stale_days: i64,
    pub cutoff: DateTime<Utc>,
    /// Days since the least recently updated stale item.
    pub oldest_days: i64,
    pub affected_assignees: usize,
    pub affected_boards: usize,
    pub by_board: Vec<(String, i64)>,
    /// Most stale first.
    pub items: Vec<StaleItem>,
}

impl StaleReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }
}

/// Items outside terminal lanes, not updated since `now - stale_days` and
/// with no time entry added in that window.
pub fn stale_report(
    ctx: &ReportContext<'_>,
    stale_days: i64,
    terminal_lanes: &Regex,
    now: DateTime<Utc>,
) -> StaleReport {
    let cutoff = now - Duration::days(stale_days);

    // Any entry counts here, not only the filtered ones.
    let touched: HashSet<&str> = ctx
        .snapshot
        .time_entries()
        .iter()
        .filter(|e| e.date_added.is_some_and(|added| added >= cutoff))
        .filter_map(|e| e.item_number.as_deref())
        .collect();

    let mut items: Vec<StaleItem> = ctx
        .items
        .iter()
        .filter(|item| !ctx.lookups.lane(item).is_some_and(|lane| terminal_lanes.is_match(lane)))
        .filter(|item| !touched.contains(item.number.as_str()))
        .filter_map(|item| {
            let updated = item.date_updated.filter(|u| *u < cutoff)?;
            Some(StaleItem {
                number: item.number.clone(),
                title: item.title.clone(),
                assignee: item.assignee.clone(),
                board: ctx.lookups.board(item).map(str::to_string),
                lane: ctx.lookups.lane(item).map(str::to_string),
                date_updated: updated,
                days_stale: (now - updated).num_days(),
            })
        })
        .collect();
    items.sort_by(|a, b| b.days_stale.cmp(&a.days_stale).then_with(|| a.number.cmp(&b.number)));

    let oldest_days = items
        .iter()
        .map(|i| i.date_updated)
        .min()
        .map(|oldest| (now - oldest).num_days())
        .unwrap_or(0);
    let assignees: BTreeSet<&str> = items.iter().filter_map(|i| i.assignee.as_deref()).collect();
    let boards: BTreeSet<&str> = items.iter().filter_map(|i| i.board.as_deref()).collect();
    let by_board = tally(items.iter().filter_map(|i| i.board.as_deref()));

    StaleReport {
        stale_days,
        cutoff,
        oldest_days,
        affected_assignees: assignees.len(),
        affected_boards: boards.len(),
        by_board,
        items,
    }
}
