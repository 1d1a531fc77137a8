//! Folder hierarchy index.
//!
//! Builds a forest from flat folder records and answers ancestor-path and
//! item-membership queries. Every operation is total: unknown folders give
//! empty results, and parent cycles are broken by promoting the folders on
//! the cycle to roots.

use crate::types::{Folder, WorkItem};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Separator used when rendering a path as a single label.
pub const PATH_SEPARATOR: &str = " > ";

/// A folder with its derived position in the forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderNode {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub item_count: i64,
    /// Child folder ids in insertion order.
    pub children: Vec<String>,
    /// Depth from the root (roots are 0).
    pub level: usize,
}

/// How a work item is assigned to its home folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeFolderRule {
    /// The parent number when it names a known folder, else the root folder number.
    #[default]
    ParentOrRoot,
    /// Like `ParentOrRoot`, but an item parented by another item inherits
    /// the home folder of the nearest ancestor item that sits in a folder.
    WalkItemParents,
}

/// Index over a folder forest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderHierarchy {
    nodes: HashMap<String, FolderNode>,
    /// First-seen order of folder ids.
    order: Vec<String>,
    roots: Vec<String>,
    root_set: HashSet<String>,
}

impl FolderHierarchy {
    /// Build the index from folder records in any order.
    ///
    /// Duplicate ids are last write wins; the folder keeps the position of
    /// its first occurrence.
    pub fn build(folders: &[Folder]) -> Self {
        let mut nodes: HashMap<String, FolderNode> = HashMap::with_capacity(folders.len());
        let mut order = Vec::with_capacity(folders.len());

        for folder in folders {
            let parent_id = folder.parent_id.clone().filter(|p| !p.is_empty());
            match nodes.get_mut(&folder.id) {
                Some(node) => {
                    node.title = folder.title.clone();
                    node.parent_id = parent_id;
                    node.item_count = folder.item_count;
                }
                None => {
                    order.push(folder.id.clone());
                    nodes.insert(
                        folder.id.clone(),
                        FolderNode {
                            id: folder.id.clone(),
                            title: folder.title.clone(),
                            parent_id,
                            item_count: folder.item_count,
                            children: Vec::new(),
                            level: 0,
                        },
                    );
                }
            }
        }

        // Link children and collect roots
        let mut roots = Vec::new();
        let mut links = Vec::new();
        for id in &order {
            match nodes[id].parent_id.as_deref() {
                Some(parent) if nodes.contains_key(parent) => {
                    links.push((parent.to_string(), id.clone()));
                }
                _ => roots.push(id.clone()),
            }
        }
        for (parent, child) in links {
            if let Some(node) = nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }

        let mut hierarchy = Self {
            nodes,
            order,
            roots: Vec::new(),
            root_set: HashSet::new(),
        };
        let mut visited = HashSet::new();
        for root in roots {
            hierarchy.add_root(root, &mut visited);
        }

        // Whatever is still unvisited is on a parent cycle or hangs off one.
        let pending: Vec<String> = hierarchy.order.clone();
        for id in pending {
            if visited.contains(&id) {
                continue;
            }
            let cycle = hierarchy.find_cycle(&id, &visited);
            for member in &cycle {
                hierarchy.detach(member);
            }
            for member in cycle {
                hierarchy.add_root(member, &mut visited);
            }
        }

        hierarchy
    }

    fn add_root(&mut self, id: String, visited: &mut HashSet<String>) {
        self.root_set.insert(id.clone());
        self.roots.push(id.clone());
        self.assign_levels(&id, visited);
    }

    /// Iterative depth-first walk assigning levels below `root`.
    fn assign_levels(&mut self, root: &str, visited: &mut HashSet<String>) {
        let mut stack = vec![(root.to_string(), 0usize)];
        while let Some((id, level)) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            node.level = level;
            for child in node.children.iter().rev() {
                if !visited.contains(child) {
                    stack.push((child.clone(), level + 1));
                }
            }
        }
    }

    /// Follow parents from `start` until an id repeats and return the loop,
    /// in parent-walk order. Empty when the walk reaches visited ground.
    fn find_cycle(&self, start: &str, visited: &HashSet<String>) -> Vec<String> {
        let mut walk: Vec<&str> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut current = start;

        loop {
            if visited.contains(current) {
                return Vec::new();
            }
            if let Some(&at) = position.get(current) {
                return walk[at..].iter().map(|s| s.to_string()).collect();
            }
            position.insert(current, walk.len());
            walk.push(current);

            match self
                .nodes
                .get(current)
                .and_then(|n| n.parent_id.as_deref())
                .filter(|p| self.nodes.contains_key(*p))
            {
                Some(parent) => current = parent,
                None => return Vec::new(),
            }
        }
    }

    /// Remove `id` from its parent's child list.
    fn detach(&mut self, id: &str) {
        let Some(parent) = self.nodes.get(id).and_then(|n| n.parent_id.clone()) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|c| c != id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&FolderNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.root_set.contains(id)
    }

    /// Root ids: folders whose parent is missing or unknown, then cycle members.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &FolderNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn children(&self, id: &str) -> Vec<&FolderNode> {
        self.nodes
            .get(id)
            .map(|n| n.children.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    /// Titles from the root down to `id` inclusive. Unknown id gives an empty path.
    pub fn path(&self, id: &str) -> Vec<String> {
        let mut titles = Vec::new();
        let mut seen = HashSet::new();
        let mut current = id;

        while let Some(node) = self.nodes.get(current) {
            if !seen.insert(current) {
                break;
            }
            titles.push(node.title.clone());
            if self.root_set.contains(current) {
                break;
            }
            match node.parent_id.as_deref() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        titles.reverse();
        titles
    }

    pub fn path_label(&self, id: &str) -> String {
        self.path(id).join(PATH_SEPARATOR)
    }

    /// `id` followed by every folder reachable through child lists.
    pub fn descendants(&self, id: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let Some(start) = self.nodes.get_key_value(id).map(|(k, _)| k.as_str()) else {
            return out;
        };
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            if let Some(node) = self.nodes.get(current) {
                for child in node.children.iter().rev() {
                    stack.push(child.as_str());
                }
            }
        }
        out
    }

    /// Case-insensitive title search, in first-seen order.
    pub fn search(&self, query: &str) -> Vec<&FolderNode> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.iter()
            .filter(|n| n.title.to_lowercase().contains(&needle))
            .collect()
    }

    /// Home folder under the default rule.
    pub fn home_folder<'a>(&self, item: &'a WorkItem) -> Option<&'a str> {
        match item.parent_number.as_deref() {
            Some(parent) if self.nodes.contains_key(parent) => Some(parent),
            _ => item.root_folder_number.as_deref(),
        }
    }

    /// Resolve home folders for a batch of items, deduplicated by item id.
    pub fn place<'a, I>(&self, items: I, rule: HomeFolderRule) -> ItemPlacement<'a>
    where
        I: IntoIterator<Item = &'a WorkItem>,
    {
        let mut seen: HashSet<&'a str> = HashSet::new();
        let mut unique: Vec<&'a WorkItem> = Vec::new();
        for item in items {
            if seen.insert(item.id.as_str()) {
                unique.push(item);
            }
        }

        let entries = match rule {
            HomeFolderRule::ParentOrRoot => unique
                .into_iter()
                .map(|item| (item, self.home_folder(item)))
                .collect(),
            HomeFolderRule::WalkItemParents => {
                let mut by_number: HashMap<&'a str, &'a WorkItem> = HashMap::new();
                for &item in &unique {
                    by_number.insert(item.number.as_str(), item);
                }
                unique
                    .iter()
                    .map(|item| (*item, self.home_through_parents(*item, &by_number)))
                    .collect()
            }
        };

        ItemPlacement { entries }
    }

    fn home_through_parents<'a>(
        &self,
        item: &'a WorkItem,
        by_number: &HashMap<&str, &'a WorkItem>,
    ) -> Option<&'a str> {
        let mut seen = HashSet::new();
        let mut current = item;
        loop {
            let Some(parent) = current.parent_number.as_deref() else {
                break;
            };
            if self.nodes.contains_key(parent) {
                return Some(parent);
            }
            match by_number.get(parent) {
                Some(&next) if seen.insert(current.number.as_str()) => current = next,
                _ => break,
            }
        }
        item.root_folder_number.as_deref()
    }

    /// Items whose home folder is exactly `folder_id`.
    pub fn direct_items<'a, I>(&self, folder_id: &str, items: I) -> Vec<&'a WorkItem>
    where
        I: IntoIterator<Item = &'a WorkItem>,
    {
        self.place(items, HomeFolderRule::default())
            .direct(self, folder_id)
    }

    /// Items homed in `folder_id` or any of its descendants.
    pub fn descendant_items<'a, I>(&self, folder_id: &str, items: I) -> Vec<&'a WorkItem>
    where
        I: IntoIterator<Item = &'a WorkItem>,
    {
        self.place(items, HomeFolderRule::default())
            .within(self, folder_id)
    }
}

/// Work items paired with their resolved home folder.
#[derive(Debug, Clone, Default)]
pub struct ItemPlacement<'a> {
    entries: Vec<(&'a WorkItem, Option<&'a str>)>,
}

impl<'a> ItemPlacement<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn home_of(&self, item_id: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|(item, _)| item.id == item_id)
            .and_then(|(_, home)| *home)
    }

    /// Unknown folders yield nothing, even if items name them as home.
    pub fn direct(&self, hierarchy: &FolderHierarchy, folder_id: &str) -> Vec<&'a WorkItem> {
        if !hierarchy.contains(folder_id) {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|(_, home)| *home == Some(folder_id))
            .map(|(item, _)| *item)
            .collect()
    }

    /// Unknown folders yield nothing, even if items name them as home.
    pub fn within(&self, hierarchy: &FolderHierarchy, folder_id: &str) -> Vec<&'a WorkItem> {
        let scope: HashSet<&str> = hierarchy.descendants(folder_id).into_iter().collect();
        if scope.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|(_, home)| home.is_some_and(|h| scope.contains(h)))
            .map(|(item, _)| *item)
            .collect()
    }

    /// Items whose home folder is not in the index.
    pub fn unplaced(&self, hierarchy: &FolderHierarchy) -> Vec<&'a WorkItem> {
        self.entries
            .iter()
            .filter(|(_, home)| !home.is_some_and(|h| hierarchy.contains(h)))
            .map(|(item, _)| *item)
            .collect()
    }
}
