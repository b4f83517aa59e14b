//! Grouping tree engine.
//!
//! Every operation is a pure function from a forest (the ordered list of top-level groups) to a
//! new forest. Nodes are never mutated in place: the path from the root to a changed node is
//! rebuilt and every sibling off that path is shared with the input through its `Arc`. Callers
//! can therefore keep the previous forest as an undo snapshot at no cost, and detect "nothing
//! changed" with `Arc::ptr_eq`.
//!
//! Node lookups are depth-first and pre-order across the forest: a top-level group is visited
//! before its subgroups, and its whole subtree before the next top-level group. The first match
//! wins. Unless stated otherwise an unknown id leaves the forest unchanged.

use crate::model::{Diagnosis, Forest, Group};
use crate::{GroupId, GroupingError, GroupingResult};
use dxg_types::{collation_key, fold_case, NonEmptyText};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// Compares group names the way the front-end sorts them.
///
/// Accent- and case-insensitive first, so `"Édema"` sorts before `"Migraine"` and `"anaemia"`
/// next to `"Asthma"`. Ties fall back to the case-folded form, then the raw strings, so the
/// order is total and stable.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| fold_case(a).cmp(&fold_case(b)))
        .then_with(|| a.cmp(b))
}

/// Sorts top-level groups alphabetically by name.
pub fn sort_top_level(forest: &mut Forest) {
    forest.sort_by(|a, b| compare_names(&a.name, &b.name));
}

/// Returns the first node (pre-order) with the given id.
pub fn find_group<'a>(forest: &'a [Arc<Group>], group_id: &GroupId) -> Option<&'a Arc<Group>> {
    for node in forest {
        if node.id == *group_id {
            return Some(node);
        }
        if let Some(found) = find_group(&node.subgroups, group_id) {
            return Some(found);
        }
    }
    None
}

pub fn contains_group(forest: &[Arc<Group>], group_id: &GroupId) -> bool {
    find_group(forest, group_id).is_some()
}

/// Returns the node currently holding `diagnosis_id` together with the diagnosis record.
pub fn find_diagnosis<'a>(
    forest: &'a [Arc<Group>],
    diagnosis_id: &str,
) -> Option<(&'a Arc<Group>, &'a Diagnosis)> {
    for node in forest {
        if let Some(diagnosis) = node.diagnoses.iter().find(|d| d.id == diagnosis_id) {
            return Some((node, diagnosis));
        }
        if let Some(found) = find_diagnosis(&node.subgroups, diagnosis_id) {
            return Some(found);
        }
    }
    None
}

/// Every diagnosis id held anywhere in the forest.
pub fn diagnosis_ids(forest: &[Arc<Group>]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for node in forest {
        collect_into(node, &mut |d: &Diagnosis| {
            ids.insert(d.id.clone());
        });
    }
    ids
}

/// All diagnoses held by `group` and its descendants, in pre-order.
pub fn collect_diagnoses(group: &Group) -> Vec<Diagnosis> {
    let mut collected = Vec::new();
    collect_into(group, &mut |d: &Diagnosis| collected.push(d.clone()));
    collected
}

fn collect_into(group: &Group, sink: &mut impl FnMut(&Diagnosis)) {
    for diagnosis in &group.diagnoses {
        sink(diagnosis);
    }
    for subgroup in &group.subgroups {
        collect_into(subgroup, sink);
    }
}

/// Appends `incoming` to `unsorted`, skipping ids already present.
pub fn merge_unsorted(unsorted: &[Diagnosis], incoming: Vec<Diagnosis>) -> Vec<Diagnosis> {
    let mut seen: HashSet<String> = unsorted.iter().map(|d| d.id.clone()).collect();
    let mut merged = unsorted.to_vec();
    for diagnosis in incoming {
        if seen.insert(diagnosis.id.clone()) {
            merged.push(diagnosis);
        }
    }
    merged
}

fn rebuild(node: &Group, diagnoses: Option<Vec<Diagnosis>>, subgroups: Option<Forest>) -> Group {
    Group {
        id: node.id.clone(),
        name: node.name.clone(),
        diagnoses: diagnoses.unwrap_or_else(|| node.diagnoses.clone()),
        subgroups: subgroups.unwrap_or_else(|| node.subgroups.clone()),
        collapsed: node.collapsed,
    }
}

/// Replaces the first node matching `group_id` with `edit(node)`.
///
/// Returns `None` when no node matched.
fn edit_first(
    forest: &[Arc<Group>],
    group_id: &GroupId,
    edit: &mut impl FnMut(&Group) -> Group,
) -> Option<Forest> {
    for (index, node) in forest.iter().enumerate() {
        let replacement = if node.id == *group_id {
            Some(edit(node))
        } else {
            edit_first(&node.subgroups, group_id, edit)
                .map(|subgroups| rebuild(node, None, Some(subgroups)))
        };

        if let Some(replacement) = replacement {
            let mut edited = forest.to_vec();
            edited[index] = Arc::new(replacement);
            return Some(edited);
        }
    }
    None
}

/// Removes the first node matching `group_id` from wherever it sits.
///
/// Returns the new forest and the detached node, or `None` when no node matched.
fn detach_first(forest: &[Arc<Group>], group_id: &GroupId) -> Option<(Forest, Arc<Group>)> {
    for (index, node) in forest.iter().enumerate() {
        if node.id == *group_id {
            let mut remaining = forest.to_vec();
            let detached = remaining.remove(index);
            return Some((remaining, detached));
        }

        if let Some((subgroups, detached)) = detach_first(&node.subgroups, group_id) {
            let mut edited = forest.to_vec();
            edited[index] = Arc::new(rebuild(node, None, Some(subgroups)));
            return Some((edited, detached));
        }
    }
    None
}

/// Drops every diagnosis matching `is_removed` from every node except those with id `keep_in`.
///
/// Returns `None` when nothing was removed.
fn strip_diagnoses(
    forest: &[Arc<Group>],
    keep_in: Option<&GroupId>,
    is_removed: &dyn Fn(&str) -> bool,
) -> Option<Forest> {
    let mut changed = false;

    let stripped = forest
        .iter()
        .map(|node| {
            let subgroups = strip_diagnoses(&node.subgroups, keep_in, is_removed);
            let holds_removed = keep_in != Some(&node.id)
                && node.diagnoses.iter().any(|d| is_removed(&d.id));

            if subgroups.is_none() && !holds_removed {
                return Arc::clone(node);
            }

            changed = true;
            let diagnoses = holds_removed.then(|| {
                node.diagnoses
                    .iter()
                    .filter(|d| !is_removed(&d.id))
                    .cloned()
                    .collect()
            });
            Arc::new(rebuild(node, diagnoses, subgroups))
        })
        .collect();

    changed.then_some(stripped)
}

/// Removes every diagnosis whose id is in `ids` from the whole forest.
pub fn remove_diagnoses(forest: &[Arc<Group>], ids: &HashSet<String>) -> Forest {
    if ids.is_empty() {
        return forest.to_vec();
    }
    strip_diagnoses(forest, None, &|id| ids.contains(id)).unwrap_or_else(|| forest.to_vec())
}

/// Moves `diagnosis` into the group `target_group_id`.
///
/// Every other occurrence of the diagnosis id is removed first, so an id is held by at most one
/// node afterwards. If the diagnosis already sits in the target the forest is returned
/// unchanged.
///
/// If `target_group_id` does not exist the diagnosis is still removed from everywhere and not
/// re-added. Callers that must not lose diagnoses check [`contains_group`] first.
pub fn move_diagnosis(
    forest: &[Arc<Group>],
    target_group_id: &GroupId,
    diagnosis: &Diagnosis,
) -> Forest {
    let target_exists = contains_group(forest, target_group_id);
    let keep_in = target_exists.then_some(target_group_id);

    let stripped = strip_diagnoses(forest, keep_in, &|id| id == diagnosis.id)
        .unwrap_or_else(|| forest.to_vec());

    if !target_exists {
        return stripped;
    }

    let already_there = find_group(&stripped, target_group_id)
        .map(|target| target.holds(&diagnosis.id))
        .unwrap_or(false);
    if already_there {
        return stripped;
    }

    edit_first(&stripped, target_group_id, &mut |node| {
        let mut diagnoses = node.diagnoses.clone();
        diagnoses.push(diagnosis.clone());
        rebuild(node, Some(diagnoses), None)
    })
    .unwrap_or(stripped)
}

/// Appends `subgroup` to the children of the first node matching `parent_group_id`.
///
/// Returns `None` when the parent does not exist.
pub fn insert_subgroup(
    forest: &[Arc<Group>],
    parent_group_id: &GroupId,
    subgroup: Group,
) -> Option<Forest> {
    let subgroup = Arc::new(subgroup);
    edit_first(forest, parent_group_id, &mut |node| {
        let mut subgroups = node.subgroups.clone();
        subgroups.push(Arc::clone(&subgroup));
        rebuild(node, None, Some(subgroups))
    })
}

/// Creates an empty subgroup called `name` under `parent_group_id`.
///
/// No-op if `name` is blank or the parent does not exist.
pub fn add_subgroup(forest: &[Arc<Group>], parent_group_id: &GroupId, name: &str) -> Forest {
    let Ok(name) = NonEmptyText::new(name) else {
        return forest.to_vec();
    };
    insert_subgroup(forest, parent_group_id, Group::new(&name)).unwrap_or_else(|| forest.to_vec())
}

/// Replaces the children of `parent_group_id` with `new_order`, verbatim.
///
/// The caller is trusted to pass a permutation of the existing children; use
/// [`try_reorder_subgroups`] when that is not guaranteed.
pub fn reorder_subgroups(
    forest: &[Arc<Group>],
    parent_group_id: &GroupId,
    new_order: Forest,
) -> Forest {
    edit_first(forest, parent_group_id, &mut |node| {
        rebuild(node, None, Some(new_order.clone()))
    })
    .unwrap_or_else(|| forest.to_vec())
}

/// Like [`reorder_subgroups`], but checks that `new_order` holds exactly the parent's current
/// children.
///
/// # Errors
///
/// - `GroupNotFound` if the parent does not exist
/// - `InvalidInput` if `new_order` is not a permutation of the current children
pub fn try_reorder_subgroups(
    forest: &[Arc<Group>],
    parent_group_id: &GroupId,
    new_order: Forest,
) -> GroupingResult<Forest> {
    let parent = find_group(forest, parent_group_id)
        .ok_or_else(|| GroupingError::GroupNotFound(parent_group_id.to_string()))?;

    let mut current: Vec<&GroupId> = parent.subgroups.iter().map(|g| &g.id).collect();
    let mut proposed: Vec<&GroupId> = new_order.iter().map(|g| &g.id).collect();
    current.sort();
    proposed.sort();

    if current != proposed {
        return Err(GroupingError::InvalidInput(format!(
            "new order must contain exactly the current subgroups of {}",
            parent_group_id
        )));
    }

    Ok(reorder_subgroups(forest, parent_group_id, new_order))
}

/// Flips the `collapsed` flag of the first node matching `group_id`.
pub fn toggle_collapse(forest: &[Arc<Group>], group_id: &GroupId) -> Forest {
    edit_first(forest, group_id, &mut |node| {
        let mut toggled = rebuild(node, None, None);
        toggled.collapsed = !node.collapsed;
        toggled
    })
    .unwrap_or_else(|| forest.to_vec())
}

/// Deletes the first node matching `group_id` together with its subtree.
///
/// Returns the new forest and every diagnosis the deleted subtree held, in pre-order. The caller
/// files them into the unsorted list with [`merge_unsorted`]. An unknown id yields the forest
/// unchanged and nothing collected.
pub fn delete_group(forest: &[Arc<Group>], group_id: &GroupId) -> (Forest, Vec<Diagnosis>) {
    match detach_first(forest, group_id) {
        Some((remaining, detached)) => (remaining, collect_diagnoses(&detached)),
        None => (forest.to_vec(), Vec::new()),
    }
}

fn top_level_index(forest: &[Arc<Group>], name: &NonEmptyText) -> Option<usize> {
    forest.iter().position(|g| name.eq_ignore_case(&g.name))
}

fn dedupe_by_id<'a>(
    diagnoses: impl IntoIterator<Item = &'a Diagnosis>,
    seen: &mut HashSet<String>,
) -> Vec<Diagnosis> {
    diagnoses
        .into_iter()
        .filter(|d| seen.insert(d.id.clone()))
        .cloned()
        .collect()
}

/// Adds `diagnoses` to the top-level group called `name` (case-insensitive), creating it if
/// needed.
///
/// Merging keeps the existing group's casing and skips ids it already holds. Creating a group
/// re-sorts the top level alphabetically; merging leaves the order alone.
pub fn create_or_merge_group(
    forest: &[Arc<Group>],
    name: &NonEmptyText,
    diagnoses: &[Diagnosis],
) -> Forest {
    match top_level_index(forest, name) {
        Some(index) => {
            let existing = &forest[index];
            let mut seen: HashSet<String> =
                existing.diagnoses.iter().map(|d| d.id.clone()).collect();
            let additions = dedupe_by_id(diagnoses, &mut seen);

            if additions.is_empty() {
                return forest.to_vec();
            }

            let mut merged = existing.diagnoses.clone();
            merged.extend(additions);

            let mut edited = forest.to_vec();
            edited[index] = Arc::new(rebuild(existing, Some(merged), None));
            edited
        }
        None => {
            let mut seen = HashSet::new();
            let group = Group::with_diagnoses(name, dedupe_by_id(diagnoses, &mut seen));

            let mut edited = forest.to_vec();
            edited.push(Arc::new(group));
            sort_top_level(&mut edited);
            edited
        }
    }
}

/// Creates an empty top-level group called `name` and re-sorts the top level.
///
/// # Errors
///
/// Returns `DuplicateName` if a top-level group with the same name (case-insensitive) exists.
pub fn create_empty_group(forest: &[Arc<Group>], name: &NonEmptyText) -> GroupingResult<Forest> {
    if let Some(index) = top_level_index(forest, name) {
        return Err(GroupingError::DuplicateName(forest[index].name.clone()));
    }

    let mut edited = forest.to_vec();
    edited.push(Arc::new(Group::new(name)));
    sort_top_level(&mut edited);
    Ok(edited)
}
