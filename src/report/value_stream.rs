//! Board-scoped folder trees with direct and rolled-up budget metrics.

use super::ReportContext;
use super::budget::{BudgetLine, BudgetTotals};
use crate::hierarchy::{FolderHierarchy, HomeFolderRule, ItemPlacement, PATH_SEPARATOR};
use crate::types::WorkItem;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueStreamNode {
    pub id: String,
    pub title: String,
    pub level: usize,
    pub path: Vec<String>,
    /// Items homed exactly here.
    pub direct: BudgetTotals,
    /// Items homed here or anywhere below.
    pub total: BudgetTotals,
    pub direct_items: Vec<BudgetLine>,
    pub child_titles: Vec<String>,
    pub children: Vec<ValueStreamNode>,
}

impl ValueStreamNode {
    pub fn path_label(&self) -> String {
        self.path.join(PATH_SEPARATOR)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueStreams {
    pub board: String,
    pub totals: BudgetTotals,
    pub streams: Vec<ValueStreamNode>,
    /// Board items whose home folder is not a known folder.
    pub unplaced: usize,
}

/// A folder title match with its rolled-up counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderHit {
    pub id: String,
    pub title: String,
    pub level: usize,
    pub path: String,
    pub total: BudgetTotals,
}

struct StreamBuilder<'c, 'a> {
    ctx: &'c ReportContext<'a>,
    hierarchy: &'c FolderHierarchy,
    placement: &'c ItemPlacement<'a>,
}

impl StreamBuilder<'_, '_> {
    fn lines(&self, items: &[&WorkItem]) -> Vec<BudgetLine> {
        items.iter().map(|item| BudgetLine::for_item(self.ctx, item)).collect()
    }

    fn node(&self, id: &str) -> Option<ValueStreamNode> {
        let folder = self.hierarchy.get(id)?;
        let child_folders = self.hierarchy.children(id);
        let within = self.placement.within(self.hierarchy, id);
        if within.is_empty() && child_folders.is_empty() {
            return None;
        }

        let direct_items = self.lines(&self.placement.direct(self.hierarchy, id));
        let total = BudgetTotals::of(&self.lines(&within));
        let children: Vec<ValueStreamNode> = child_folders.iter().filter_map(|c| self.node(&c.id)).collect();

        Some(ValueStreamNode {
            id: folder.id.clone(),
            title: folder.title.clone(),
            level: folder.level,
            path: self.hierarchy.path(id),
            direct: BudgetTotals::of(&direct_items),
            total,
            direct_items,
            child_titles: children.iter().map(|c| c.title.clone()).collect(),
            children,
        })
    }
}

/// Folder trees for one board. Only roots with items somewhere in their
/// tree are returned.
pub fn value_streams(ctx: &ReportContext<'_>, board: &str, rule: HomeFolderRule) -> ValueStreams {
    let hierarchy = FolderHierarchy::build(ctx.snapshot.folders());
    let items = ctx.board_items(board);
    let placement = hierarchy.place(items.iter().copied(), rule);

    let builder = StreamBuilder {
        ctx,
        hierarchy: &hierarchy,
        placement: &placement,
    };
    let streams = hierarchy
        .roots()
        .iter()
        .filter_map(|root| builder.node(root))
        .filter(|node| node.total.items > 0)
        .collect();

    let lines = builder.lines(&items);
    tracing::debug!(board, folders = hierarchy.len(), items = items.len(), "built value streams");

    ValueStreams {
        board: board.to_string(),
        totals: BudgetTotals::of(&lines),
        streams,
        unplaced: placement.unplaced(&hierarchy).len(),
    }
}

/// Folders whose title contains `query` and that hold at least one of the
/// board's items in their tree.
pub fn search_streams(
    ctx: &ReportContext<'_>,
    board: &str,
    query: &str,
    rule: HomeFolderRule,
) -> Vec<FolderHit> {
    let hierarchy = FolderHierarchy::build(ctx.snapshot.folders());
    let items = ctx.board_items(board);
    let placement = hierarchy.place(items.iter().copied(), rule);

    hierarchy
        .search(query)
        .into_iter()
        .filter_map(|folder| {
            let within = placement.within(&hierarchy, &folder.id);
            if within.is_empty() {
                return None;
            }
            let lines: Vec<BudgetLine> = within.iter().map(|item| BudgetLine::for_item(ctx, item)).collect();
            Some(FolderHit {
                id: folder.id.clone(),
                title: folder.title.clone(),
                level: folder.level,
                path: hierarchy.path_label(&folder.id),
                total: BudgetTotals::of(&lines),
            })
        })
        .collect()
}
