//! Headline metrics plus the overview, time-tracking and team reports.

use super::{ReportContext, completion_rate, sum_by, tally};
use crate::types::WorkItem;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub total_items: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub time_tracked_seconds: i64,
    /// Distinct assignees among the filtered items.
    pub active_users: usize,
}

pub fn key_metrics(ctx: &ReportContext<'_>) -> KeyMetrics {
    let completed = ctx.items.iter().filter(|i| i.is_completed()).count();
    let active_users: HashSet<&str> = ctx.items.iter().filter_map(|i| i.assignee.as_deref()).collect();
    KeyMetrics {
        total_items: ctx.items.len(),
        completed,
        in_progress: ctx.items.len() - completed,
        time_tracked_seconds: ctx.items.iter().map(|i| i.time_spent()).sum(),
        active_users: active_users.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub completed: usize,
    pub in_progress: usize,
    pub by_work_type: Vec<(String, i64)>,
    /// Items created per day, oldest first.
    pub created_per_day: Vec<(NaiveDate, i64)>,
    pub by_priority: Vec<(String, i64)>,
}

pub fn overview(ctx: &ReportContext<'_>) -> Overview {
    let completed = ctx.items.iter().filter(|i| i.is_completed()).count();
    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for item in &ctx.items {
        if let Some(added) = item.date_added {
            *per_day.entry(added.date_naive()).or_default() += 1;
        }
    }
    Overview {
        completed,
        in_progress: ctx.items.len() - completed,
        by_work_type: tally(ctx.items.iter().filter_map(|i| ctx.lookups.work_type(i))),
        created_per_day: per_day.into_iter().collect(),
        by_priority: tally(ctx.items.iter().filter_map(|i| ctx.lookups.priority(i))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeReport {
    /// Seconds logged per entry author, highest first.
    pub by_user: Vec<(String, i64)>,
    /// Seconds logged per entry start day, oldest first.
    pub per_day: Vec<(NaiveDate, i64)>,
    pub manual_entries: usize,
    pub automatic_entries: usize,
    pub top_items: Vec<TimeLeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeLeader {
    pub number: String,
    pub title: String,
    pub assignee: Option<String>,
    pub time_spent_seconds: i64,
}

pub fn time_report(ctx: &ReportContext<'_>, top_n: usize) -> TimeReport {
    let by_user = sum_by(
        ctx.entries
            .iter()
            .filter_map(|e| e.author.as_deref().map(|a| (a, e.length_seconds))),
    );

    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for entry in &ctx.entries {
        if let Some(start) = entry.start_date {
            *per_day.entry(start.date_naive()).or_default() += entry.length_seconds;
        }
    }

    let manual_entries = ctx.entries.iter().filter(|e| e.manual).count();

    let mut with_time: Vec<&WorkItem> = ctx.items.iter().copied().filter(|i| i.time_spent() > 0).collect();
    with_time.sort_by(|a, b| b.time_spent().cmp(&a.time_spent()).then_with(|| a.number.cmp(&b.number)));
    let top_items = with_time
        .into_iter()
        .take(top_n)
        .map(|i| TimeLeader {
            number: i.number.clone(),
            title: i.title.clone(),
            assignee: i.assignee.clone(),
            time_spent_seconds: i.time_spent(),
        })
        .collect();

    TimeReport {
        by_user,
        per_day: per_day.into_iter().collect(),
        manual_entries,
        automatic_entries: ctx.entries.len() - manual_entries,
        top_items,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub completion_rate: f64,
    pub time_spent_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamReport {
    pub items_by_assignee: Vec<(String, i64)>,
    pub completed_by_assignee: Vec<(String, i64)>,
    /// One row per assignee, most items first.
    pub users: Vec<UserSummary>,
}

pub fn team_report(ctx: &ReportContext<'_>, leaderboard_size: usize) -> TeamReport {
    let mut items_by_assignee = tally(ctx.items.iter().filter_map(|i| i.assignee.as_deref()));
    items_by_assignee.truncate(leaderboard_size);

    let mut completed_by_assignee = tally(
        ctx.items
            .iter()
            .filter(|i| i.is_completed())
            .filter_map(|i| i.assignee.as_deref()),
    );
    completed_by_assignee.truncate(leaderboard_size);

    let mut per_user: HashMap<&str, (usize, usize, i64)> = HashMap::new();
    for item in &ctx.items {
        let Some(assignee) = item.assignee.as_deref() else {
            continue;
        };
        let row = per_user.entry(assignee).or_default();
        row.0 += 1;
        if item.is_completed() {
            row.1 += 1;
        }
        row.2 += item.time_spent();
    }

    let mut users: Vec<UserSummary> = per_user
        .into_iter()
        .map(|(username, (total, completed, time))| UserSummary {
            username: username.to_string(),
            total,
            completed,
            in_progress: total - completed,
            completion_rate: completion_rate(completed, total),
            time_spent_seconds: time,
        })
        .collect();
    users.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.username.cmp(&b.username)));

    TeamReport {
        items_by_assignee,
        completed_by_assignee,
        users,
    }
}
