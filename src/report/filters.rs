//! Report filters and their query-string form.

use crate::error::{AnalyticsError, Result};
use crate::snapshot::{Lookups, Snapshot};
use crate::types::{TimeEntry, WorkItem};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Completion state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionFilter {
    #[default]
    All,
    Completed,
    InProgress,
}

impl CompletionFilter {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "completed" | "done" => Ok(Self::Completed),
            "in_progress" | "in-progress" | "open" => Ok(Self::InProgress),
            other => Err(AnalyticsError::invalid_filter(
                "completion",
                format!("'{}' is not one of all, completed, in_progress", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Completed => "completed",
            Self::InProgress => "in_progress",
        }
    }

    fn accepts(&self, item: &WorkItem) -> bool {
        match self {
            Self::All => true,
            Self::Completed => item.is_completed(),
            Self::InProgress => !item.is_completed(),
        }
    }
}

/// A resolved filter. Empty lists mean "all".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFilter {
    /// Inclusive range on `date_added`.
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub assignees: Vec<String>,
    pub authors: Vec<String>,
    pub work_types: Vec<String>,
    pub priorities: Vec<String>,
    pub boards: Vec<String>,
    pub lanes: Vec<String>,
    pub completion: CompletionFilter,
}

fn admits(selected: &[String], value: Option<&str>) -> bool {
    selected.is_empty() || value.is_some_and(|v| selected.iter().any(|s| s == v))
}

impl ReportFilter {
    /// A filter over a date range with every other dimension open.
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            assignees: Vec::new(),
            authors: Vec::new(),
            work_types: Vec::new(),
            priorities: Vec::new(),
            boards: Vec::new(),
            lanes: Vec::new(),
            completion: CompletionFilter::All,
        }
    }

    fn in_range(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// Archived items never match.
    pub fn matches_item(&self, item: &WorkItem, lookups: &Lookups<'_>) -> bool {
        if item.archived {
            return false;
        }
        let Some(added) = item.date_added else {
            return false;
        };
        self.in_range(added.date_naive())
            && admits(&self.assignees, item.assignee.as_deref())
            && admits(&self.authors, item.author.as_deref())
            && admits(&self.work_types, lookups.work_type(item))
            && admits(&self.priorities, lookups.priority(item))
            && admits(&self.boards, lookups.board(item))
            && admits(&self.lanes, lookups.lane(item))
            && self.completion.accepts(item)
    }

    /// Entries are matched on start date and, when assignees are selected, on author.
    pub fn matches_entry(&self, entry: &TimeEntry) -> bool {
        let Some(start) = entry.start_date else {
            return false;
        };
        self.in_range(start.date_naive()) && admits(&self.assignees, entry.author.as_deref())
    }
}

/// Rolling two-week window ending on the most recent Sunday, clamped to the data.
///
/// `data_range` is the min and max `date_added` of the loaded items. When the
/// clamped window is empty, the last `fallback_days` of data are used instead.
pub fn default_window(
    today: NaiveDate,
    data_range: Option<(NaiveDate, NaiveDate)>,
    fallback_days: i64,
) -> (NaiveDate, NaiveDate) {
    let last_sunday = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
    let window_start = last_sunday - Duration::days(14);

    let Some((min_date, max_date)) = data_range else {
        return (window_start, last_sunday);
    };

    let start = window_start.max(min_date);
    let end = last_sunday.min(max_date);
    if start > end {
        ((max_date - Duration::days(fallback_days)).max(min_date), max_date)
    } else {
        (start, end)
    }
}

/// Min and max `date_added` over non-archived items.
pub fn data_range(items: &[WorkItem]) -> Option<(NaiveDate, NaiveDate)> {
    let mut days = items
        .iter()
        .filter(|i| !i.archived)
        .filter_map(|i| i.date_added.map(|d| d.date_naive()));
    let first = days.next()?;
    Some(days.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

/// Filter as it appears in a query string. Lists are comma-separated, with
/// literal commas written as `\,`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_types: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boards: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lanes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
}

/// Escape one list value so commas and backslashes inside it survive a split.
pub fn escape_list_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace(',', "\\,")
}

/// Comma-joined list form of `values`, each escaped.
pub fn join_list(values: &[String]) -> String {
    values.iter().map(|v| escape_list_value(v)).collect::<Vec<_>>().join(",")
}

/// Split on unescaped commas. `\,` is a literal comma and `\\` a backslash.
fn split_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().unwrap_or('\\')),
            ',' => values.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    values.push(current);

    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        .map(str::to_string)
        .collect()
}

fn parse_day(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AnalyticsError::invalid_filter(field, format!("'{}' is not YYYY-MM-DD", s))),
    }
}

impl FilterParams {
    /// Resolve against a default window for missing dates.
    pub fn resolve(&self, default: (NaiveDate, NaiveDate)) -> Result<ReportFilter> {
        let start = parse_day("from", self.from.as_deref())?.unwrap_or(default.0);
        let end = parse_day("to", self.to.as_deref())?.unwrap_or(default.1);
        if start > end {
            return Err(AnalyticsError::invalid_filter(
                "from",
                format!("{} is after {}", start, end),
            ));
        }

        Ok(ReportFilter {
            start,
            end,
            assignees: split_list(self.assignees.as_deref()),
            authors: split_list(self.authors.as_deref()),
            work_types: split_list(self.work_types.as_deref()),
            priorities: split_list(self.priorities.as_deref()),
            boards: split_list(self.boards.as_deref()),
            lanes: split_list(self.lanes.as_deref()),
            completion: CompletionFilter::parse(self.completion.as_deref().unwrap_or(""))?,
        })
    }

    /// Resolve with the default window computed from the snapshot.
    pub fn resolve_for(&self, snapshot: &Snapshot, today: NaiveDate, fallback_days: i64) -> Result<ReportFilter> {
        let window = default_window(today, data_range(snapshot.work_items()), fallback_days);
        self.resolve(window)
    }

    /// Canonical query-string form of a resolved filter.
    pub fn from_filter(filter: &ReportFilter) -> Self {
        fn join(values: &[String]) -> Option<String> {
            if values.is_empty() { None } else { Some(join_list(values)) }
        }
        Self {
            from: Some(filter.start.format("%Y-%m-%d").to_string()),
            to: Some(filter.end.format("%Y-%m-%d").to_string()),
            assignees: join(&filter.assignees),
            authors: join(&filter.authors),
            work_types: join(&filter.work_types),
            priorities: join(&filter.priorities),
            boards: join(&filter.boards),
            lanes: join(&filter.lanes),
            completion: match filter.completion {
                CompletionFilter::All => None,
                other => Some(other.as_str().to_string()),
            },
        }
    }

    /// URL-encoded `key=value&...` without a leading `?`.
    pub fn to_query(&self) -> String {
        let pairs = [
            ("from", &self.from),
            ("to", &self.to),
            ("assignees", &self.assignees),
            ("authors", &self.authors),
            ("work_types", &self.work_types),
            ("priorities", &self.priorities),
            ("boards", &self.boards),
            ("lanes", &self.lanes),
            ("completion", &self.completion),
        ];
        pairs
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_deref()
                    .map(|v| format!("{}={}", key, urlencoding::encode(v)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Distinct values offered by the filter form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterOptions {
    pub assignees: Vec<String>,
    pub authors: Vec<String>,
    pub work_types: Vec<String>,
    pub priorities: Vec<String>,
    pub boards: Vec<String>,
    pub lanes: Vec<String>,
}

fn distinct<I: Iterator<Item = String>>(values: I) -> Vec<String> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}

impl FilterOptions {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let items = snapshot.work_items();
        let reference = &snapshot.reference;
        Self {
            assignees: distinct(items.iter().filter_map(|i| i.assignee.clone())),
            authors: distinct(items.iter().filter_map(|i| i.author.clone())),
            work_types: distinct(reference.work_types.iter().map(|l| l.name.clone())),
            priorities: distinct(reference.priorities.iter().map(|l| l.name.clone())),
            boards: distinct(reference.boards.iter().map(|b| b.label.clone())),
            lanes: distinct(reference.lanes.iter().map(|l| l.name.clone())),
        }
    }
}
