//! Integration tests for the folder hierarchy index.

use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;
use stride_analytics::hierarchy::{FolderHierarchy, HomeFolderRule};
use stride_analytics::types::{Folder, WorkItem};

/// An acyclic forest presented in shuffled order: folder `i` has a parent
/// drawn from `0..i` or none.
fn arb_forest(max: usize) -> impl Strategy<Value = Vec<Folder>> {
    prop::collection::vec((prop::bool::weighted(0.25), any::<Index>()), 1..max)
        .prop_map(|picks| {
            picks
                .iter()
                .enumerate()
                .map(|(i, (is_root, at))| {
                    let parent = if i == 0 || *is_root {
                        None
                    } else {
                        Some(format!("F{}", at.index(i)))
                    };
                    Folder::new(format!("F{}", i), format!("Folder {}", i), parent.as_deref())
                })
                .collect::<Vec<_>>()
        })
        .prop_flat_map(|folders| Just(folders).prop_shuffle())
}

/// A forest with the loop F1 -> F2 -> F3 -> F1 closed inside it.
fn arb_cyclic_forest(max: usize) -> impl Strategy<Value = Vec<Folder>> {
    arb_forest(max)
        .prop_filter("needs room for a three-folder loop", |folders| folders.len() >= 4)
        .prop_map(|mut folders| {
            for folder in folders.iter_mut() {
                match folder.id.as_str() {
                    "F1" => folder.parent_id = Some("F3".into()),
                    "F2" => folder.parent_id = Some("F1".into()),
                    "F3" => folder.parent_id = Some("F2".into()),
                    _ => {}
                }
            }
            folders
        })
}

/// Items over `folders` folder ids: some parented by a folder, some by an
/// unknown number, some with no parent, about half carrying a root folder.
fn arb_items(folders: usize, max: usize) -> impl Strategy<Value = Vec<WorkItem>> {
    prop::collection::vec((0u8..5, any::<Index>(), prop::option::of(any::<Index>())), 0..max).prop_map(
        move |picks| {
            picks
                .iter()
                .enumerate()
                .map(|(i, (kind, parent, root))| {
                    let mut item = WorkItem::new(format!("w{}", i), format!("{}", 1000 + i), format!("Item {}", i));
                    item.parent_number = match kind {
                        0 => Some("missing".into()),
                        1 => None,
                        _ => Some(format!("F{}", parent.index(folders))),
                    };
                    item.root_folder_number = root.map(|r| format!("F{}", r.index(folders)));
                    item
                })
                .collect::<Vec<_>>()
        },
    )
}

fn arb_forest_with_items() -> impl Strategy<Value = (Vec<Folder>, Vec<WorkItem>)> {
    arb_forest(40).prop_flat_map(|folders| {
        let count = folders.len();
        (Just(folders), arb_items(count, 120))
    })
}

fn ids(items: &[&WorkItem]) -> HashSet<String> {
    items.iter().map(|i| i.id.clone()).collect()
}

mod build_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn child_level_is_parent_level_plus_one(folders in arb_forest(60)) {
            let hierarchy = FolderHierarchy::build(&folders);
            prop_assert_eq!(hierarchy.len(), folders.len());

            for node in hierarchy.iter() {
                match node.parent_id.as_deref() {
                    Some(parent) => {
                        let parent = hierarchy.get(parent).unwrap();
                        prop_assert_eq!(node.level, parent.level + 1);
                        prop_assert!(parent.children.contains(&node.id));
                    }
                    None => {
                        prop_assert_eq!(node.level, 0);
                        prop_assert!(hierarchy.is_root(&node.id));
                    }
                }
            }
        }

        #[test]
        fn every_folder_is_reached_from_exactly_one_root(folders in arb_forest(80)) {
            let hierarchy = FolderHierarchy::build(&folders);

            let mut seen = HashSet::new();
            for root in hierarchy.roots() {
                for id in hierarchy.descendants(root) {
                    prop_assert!(seen.insert(id.to_string()), "{} reached twice", id);
                }
            }
            prop_assert_eq!(seen.len(), hierarchy.len());
        }

        #[test]
        fn path_length_matches_level(folders in arb_forest(50)) {
            let hierarchy = FolderHierarchy::build(&folders);
            for node in hierarchy.iter() {
                let path = hierarchy.path(&node.id);
                prop_assert_eq!(path.len(), node.level + 1);
                prop_assert_eq!(path.last(), Some(&node.title));
            }
        }

        #[test]
        fn build_is_idempotent(folders in arb_forest(40)) {
            prop_assert_eq!(FolderHierarchy::build(&folders), FolderHierarchy::build(&folders));
        }

        #[test]
        fn induced_cycle_terminates_and_assigns_levels(folders in arb_cyclic_forest(30)) {
            let hierarchy = FolderHierarchy::build(&folders);
            prop_assert_eq!(hierarchy.len(), folders.len());

            for id in ["F1", "F2", "F3"] {
                prop_assert!(hierarchy.is_root(id), "{} should be promoted", id);
                prop_assert_eq!(hierarchy.get(id).unwrap().level, 0);
                prop_assert_eq!(hierarchy.path(id).len(), 1);
            }

            let reached: usize = hierarchy.roots().iter().map(|r| hierarchy.descendants(r).len()).sum();
            prop_assert_eq!(reached, folders.len());
        }
    }
}

mod path_queries {
    use super::*;

    fn sample() -> FolderHierarchy {
        FolderHierarchy::build(&[
            Folder::new("F1", "Platform", None),
            Folder::new("F2", "Payments", Some("F1")),
            Folder::new("F3", "Refunds", Some("F2")),
        ])
    }

    #[test]
    fn root_path_is_its_own_title() {
        assert_eq!(sample().path("F1"), vec!["Platform"]);
    }

    #[test]
    fn nested_path_runs_root_to_leaf() {
        let hierarchy = sample();
        assert_eq!(hierarchy.path("F3"), vec!["Platform", "Payments", "Refunds"]);
        assert_eq!(hierarchy.path_label("F3"), "Platform > Payments > Refunds");
    }

    #[test]
    fn unknown_folder_has_empty_path() {
        let hierarchy = sample();
        assert!(hierarchy.path("nope").is_empty());
        assert_eq!(hierarchy.path_label("nope"), "");
    }
}

mod membership {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn descendant_items_is_direct_plus_children((folders, items) in arb_forest_with_items()) {
            let hierarchy = FolderHierarchy::build(&folders);

            for node in hierarchy.iter() {
                let direct = ids(&hierarchy.direct_items(&node.id, &items));
                let all = ids(&hierarchy.descendant_items(&node.id, &items));
                prop_assert!(all.is_superset(&direct));

                let mut expected = direct.clone();
                for child in &node.children {
                    expected.extend(ids(&hierarchy.descendant_items(child, &items)));
                }
                prop_assert_eq!(all, expected, "folder {}", node.id);
            }
        }

        #[test]
        fn roots_and_unplaced_partition_the_items((folders, items) in arb_forest_with_items()) {
            let hierarchy = FolderHierarchy::build(&folders);
            let placement = hierarchy.place(&items, HomeFolderRule::ParentOrRoot);

            let mut total = placement.unplaced(&hierarchy).len();
            for root in hierarchy.roots() {
                total += placement.within(&hierarchy, root).len();
            }
            prop_assert_eq!(total, items.len());
        }
    }

    #[test]
    fn missing_parent_falls_back_to_root_folder() {
        let hierarchy = FolderHierarchy::build(&[Folder::new("F1", "Platform", None)]);
        let mut item = WorkItem::new("w1", "1001", "Orphan");
        item.parent_number = Some("1000".into());
        item.root_folder_number = Some("F1".into());

        assert_eq!(hierarchy.home_folder(&item), Some("F1"));
        assert_eq!(hierarchy.direct_items("F1", [&item]).len(), 1);
    }

    #[test]
    fn item_parented_by_item_inherits_folder_under_walk_rule() {
        let hierarchy = FolderHierarchy::build(&[
            Folder::new("F1", "Platform", None),
            Folder::new("F2", "Payments", Some("F1")),
        ]);
        let mut epic = WorkItem::new("w1", "100", "Epic");
        epic.parent_number = Some("F2".into());
        epic.root_folder_number = Some("F1".into());
        let mut story = WorkItem::new("w2", "101", "Story");
        story.parent_number = Some("100".into());
        story.root_folder_number = Some("F1".into());
        let items = vec![epic, story];

        let default = hierarchy.place(&items, HomeFolderRule::ParentOrRoot);
        assert_eq!(default.home_of("w2"), Some("F1"));

        let walked = hierarchy.place(&items, HomeFolderRule::WalkItemParents);
        assert_eq!(walked.home_of("w2"), Some("F2"));
        assert_eq!(walked.direct(&hierarchy, "F2").len(), 2);
    }

    #[test]
    fn empty_inputs_give_empty_results() {
        let hierarchy = FolderHierarchy::build(&[]);
        assert!(hierarchy.is_empty());
        assert!(hierarchy.roots().is_empty());
        assert!(hierarchy.descendant_items("F1", &Vec::<WorkItem>::new()).is_empty());
        assert!(hierarchy.search("any").is_empty());
    }
}
