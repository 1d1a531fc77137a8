//! Estimated versus actual time, overall, per board and per root folder.

use super::{ReportContext, completion_rate};
use crate::format::variance_percent;
use crate::types::WorkItem;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Group label for items without a resolvable root folder.
pub const NO_FOLDER: &str = "No Folder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    OverBudget,
    UnderBudget,
    OnTarget,
}

impl BudgetStatus {
    pub fn from_variance(variance: i64) -> Self {
        match variance {
            v if v > 0 => Self::OverBudget,
            v if v < 0 => Self::UnderBudget,
            _ => Self::OnTarget,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OverBudget => "Over Budget",
            Self::UnderBudget => "Under Budget",
            Self::OnTarget => "On Target",
        }
    }
}

/// Budget figures for one work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetLine {
    pub number: String,
    pub title: String,
    pub board: Option<String>,
    pub work_type: Option<String>,
    pub assignee: Option<String>,
    pub completed: bool,
    pub estimated_seconds: i64,
    pub actual_seconds: i64,
    pub variance_seconds: i64,
    pub variance_percent: f64,
    pub date_updated: Option<DateTime<Utc>>,
}

impl BudgetLine {
    pub fn for_item(ctx: &ReportContext<'_>, item: &WorkItem) -> Self {
        let estimated = item.estimated_seconds();
        let actual = item.time_spent();
        Self {
            number: item.number.clone(),
            title: item.title.clone(),
            board: ctx.lookups.board(item).map(str::to_string),
            work_type: ctx.lookups.work_type(item).map(str::to_string),
            assignee: item.assignee.clone(),
            completed: item.is_completed(),
            estimated_seconds: estimated,
            actual_seconds: actual,
            variance_seconds: actual - estimated,
            variance_percent: variance_percent(actual, estimated),
            date_updated: item.date_updated,
        }
    }
}

/// Aggregate over a set of budget lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetTotals {
    pub items: usize,
    pub completed: usize,
    pub with_estimates: usize,
    pub estimated_seconds: i64,
    pub actual_seconds: i64,
    pub variance_seconds: i64,
    pub variance_percent: f64,
}

impl BudgetTotals {
    pub fn of<'l, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'l BudgetLine>,
    {
        let mut totals = Self::default();
        for line in lines {
            totals.items += 1;
            if line.completed {
                totals.completed += 1;
            }
            if line.estimated_seconds > 0 {
                totals.with_estimates += 1;
            }
            totals.estimated_seconds += line.estimated_seconds;
            totals.actual_seconds += line.actual_seconds;
        }
        totals.variance_seconds = totals.actual_seconds - totals.estimated_seconds;
        totals.variance_percent = variance_percent(totals.actual_seconds, totals.estimated_seconds);
        totals
    }

    pub fn status(&self) -> BudgetStatus {
        BudgetStatus::from_variance(self.variance_seconds)
    }

    pub fn completion_rate(&self) -> f64 {
        completion_rate(self.completed, self.items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardBudget {
    pub board: String,
    pub totals: BudgetTotals,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetOverview {
    pub totals: BudgetTotals,
    /// Boards by label; items without a known board are left out.
    pub boards: Vec<BoardBudget>,
    pub lines: Vec<BudgetLine>,
}

pub fn budget_lines(ctx: &ReportContext<'_>) -> Vec<BudgetLine> {
    ctx.items.iter().map(|item| BudgetLine::for_item(ctx, item)).collect()
}

pub fn budget_overview(ctx: &ReportContext<'_>) -> BudgetOverview {
    let lines = budget_lines(ctx);

    let mut per_board: BTreeMap<&str, Vec<&BudgetLine>> = BTreeMap::new();
    for line in &lines {
        if let Some(board) = line.board.as_deref() {
            per_board.entry(board).or_default().push(line);
        }
    }
    let boards = per_board
        .into_iter()
        .map(|(board, rows)| {
            let totals = BudgetTotals::of(rows);
            BoardBudget {
                board: board.to_string(),
                status: totals.status(),
                totals,
            }
        })
        .collect();

    BudgetOverview {
        totals: BudgetTotals::of(&lines),
        boards,
        lines,
    }
}

/// Items sharing a root folder within one board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderGroup {
    pub folder: String,
    pub totals: BudgetTotals,
    pub lines: Vec<BudgetLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeBudget {
    pub work_type: String,
    pub totals: BudgetTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardDrilldown {
    pub board: String,
    pub totals: BudgetTotals,
    /// Distinct root folders with items on this board.
    pub folder_count: usize,
    pub completion_rate: f64,
    /// Sorted by folder title, "No Folder" included.
    pub groups: Vec<FolderGroup>,
    pub by_work_type: Vec<TypeBudget>,
    /// Largest absolute variances among items with both an estimate and time.
    pub top_variances: Vec<BudgetLine>,
}

pub fn board_drilldown(ctx: &ReportContext<'_>, board: &str, top_n: usize) -> BoardDrilldown {
    let items = ctx.board_items(board);

    let mut groups: BTreeMap<String, Vec<BudgetLine>> = BTreeMap::new();
    let mut folders: BTreeSet<&str> = BTreeSet::new();
    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        let line = BudgetLine::for_item(ctx, item);
        let folder = ctx.lookups.root_folder(item);
        if let Some(title) = folder {
            folders.insert(title);
        }
        groups
            .entry(folder.unwrap_or(NO_FOLDER).to_string())
            .or_default()
            .push(line.clone());
        lines.push(line);
    }

    let groups = groups
        .into_iter()
        .map(|(folder, lines)| FolderGroup {
            folder,
            totals: BudgetTotals::of(&lines),
            lines,
        })
        .collect();

    let mut per_type: BTreeMap<&str, Vec<&BudgetLine>> = BTreeMap::new();
    for line in &lines {
        if let Some(work_type) = line.work_type.as_deref() {
            per_type.entry(work_type).or_default().push(line);
        }
    }
    let by_work_type = per_type
        .into_iter()
        .map(|(work_type, rows)| TypeBudget {
            work_type: work_type.to_string(),
            totals: BudgetTotals::of(rows),
        })
        .collect();

    let mut top_variances: Vec<BudgetLine> = lines
        .iter()
        .filter(|l| l.estimated_seconds > 0 && l.actual_seconds > 0)
        .cloned()
        .collect();
    top_variances.sort_by(|a, b| {
        b.variance_seconds
            .abs()
            .cmp(&a.variance_seconds.abs())
            .then_with(|| a.number.cmp(&b.number))
    });
    top_variances.truncate(top_n);

    let totals = BudgetTotals::of(&lines);
    BoardDrilldown {
        board: board.to_string(),
        folder_count: folders.len(),
        completion_rate: totals.completion_rate(),
        totals,
        groups,
        by_work_type,
        top_variances,
    }
}
