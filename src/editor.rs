//! Structural edits on the condition tree.
//!
//! Every operation takes the current [`Model`] by reference and returns a new
//! one together with a `changed` flag. Only the groups on the path from the
//! affected root down to the edit are rebuilt; every other node is the same
//! `Arc` as in the input. When nothing matched, the returned model is a clone
//! of the input (`Model::ptr_eq` holds) and `changed` is `false`.

use std::sync::Arc;

use tracing::debug;

use crate::ast::{Condition, ConditionPatch, Group, GroupKind, Model, Node, NodeId};
use crate::builder::{new_empty_condition, new_empty_group, new_empty_model};

/// New model plus whether anything moved.
pub type Edit = (Model, bool);

fn unchanged(model: &Model) -> Edit {
    (model.clone(), false)
}

/// Index and value of a direct child condition.
fn condition_position<'a>(group: &'a Group, id: &NodeId) -> Option<(usize, &'a Arc<Condition>)> {
    group
        .conditions
        .iter()
        .enumerate()
        .find_map(|(index, node)| match node {
            Node::Condition(condition) if &condition.id == id => Some((index, condition)),
            _ => None,
        })
}

/// Index of a direct child group.
fn group_position(group: &Group, id: &NodeId) -> Option<usize> {
    group
        .conditions
        .iter()
        .position(|node| matches!(node, Node::Group(child) if &child.id == id))
}

/// Depth-first search for the first group accepted by `matches`, replacing it
/// with `rewrite(group)` and copying its ancestors. `None` when no group matched
/// or `rewrite` declined.
fn rewrite_where<M, F>(group: &Arc<Group>, matches: &M, rewrite: &mut F) -> Option<Arc<Group>>
where
    M: Fn(&Group) -> bool,
    F: FnMut(&Group) -> Option<Group>,
{
    if matches(group.as_ref()) {
        return rewrite(group.as_ref()).map(Arc::new);
    }
    for (index, node) in group.conditions.iter().enumerate() {
        if let Node::Group(child) = node {
            if let Some(replacement) = rewrite_where(child, matches, rewrite) {
                let mut children = group.conditions.clone();
                children[index] = Node::Group(replacement);
                return Some(Arc::new(group.with_children(children)));
            }
        }
    }
    None
}

fn rewrite_model<M, F>(model: &Model, matches: M, mut rewrite: F) -> Option<Model>
where
    M: Fn(&Group) -> bool,
    F: FnMut(&Group) -> Option<Group>,
{
    for (index, root) in model.roots().iter().enumerate() {
        if let Some(replacement) = rewrite_where(root, &matches, &mut rewrite) {
            let mut roots = model.roots().to_vec();
            roots[index] = replacement;
            return Some(Model::from_roots_unchecked(roots));
        }
    }
    None
}

/// Rewrite the group whose id is `group_id`.
fn rewrite_group<F>(model: &Model, group_id: &NodeId, rewrite: F) -> Option<Model>
where
    F: FnMut(&Group) -> Option<Group>,
{
    rewrite_model(model, |group| &group.id == group_id, rewrite)
}

/// Rewrite the group that directly contains the group `child_id`.
fn rewrite_parent_of<F>(model: &Model, child_id: &NodeId, rewrite: F) -> Option<Model>
where
    F: FnMut(&Group) -> Option<Group>,
{
    rewrite_model(model, |group| group_position(group, child_id).is_some(), rewrite)
}

fn finish(model: &Model, rewritten: Option<Model>, operation: &str) -> Edit {
    match rewritten {
        Some(next) => {
            debug!(operation, "condition tree changed");
            (next, true)
        }
        None => {
            debug!(operation, "no matching node, model left as is");
            unchanged(model)
        }
    }
}

/// Apply `patch` to the condition `condition_id` inside the group `group_id`.
pub fn update_condition(
    model: &Model,
    group_id: &NodeId,
    condition_id: &NodeId,
    patch: &ConditionPatch,
) -> Edit {
    let rewritten = rewrite_group(model, group_id, |group| {
        let (index, condition) = condition_position(group, condition_id)?;
        let mut children = group.conditions.clone();
        children[index] = condition.patched(patch).into();
        Some(group.with_children(children))
    });
    finish(model, rewritten, "update")
}

/// Append a fresh empty condition to the group `group_id`.
pub fn add_condition_to_group(model: &Model, group_id: &NodeId) -> Edit {
    let rewritten = rewrite_group(model, group_id, |group| {
        let mut children = group.conditions.clone();
        children.push(new_empty_condition().into());
        Some(group.with_children(children))
    });
    finish(model, rewritten, "add")
}

/// Add a fresh AND condition after `siblings[index]`: into the first later AND
/// group, or as a new AND group right after the target.
fn grow_and_after(siblings: &[Arc<Group>], index: usize) -> Vec<Arc<Group>> {
    let mut grown = siblings.to_vec();
    match siblings[index + 1..].iter().position(|sibling| sibling.is_and()) {
        Some(offset) => {
            let sibling = &siblings[index + 1 + offset];
            let mut conditions = sibling.conditions.clone();
            conditions.push(new_empty_condition().into());
            grown[index + 1 + offset] = Arc::new(sibling.with_children(conditions));
        }
        None => grown.insert(index + 1, Arc::new(new_empty_group(GroupKind::And, None))),
    }
    grown
}

/// Grow "all of the following" next to the group `group_id`.
///
/// Looks at the siblings after the target in its parent. The first AND group
/// found there gets a fresh condition; otherwise a new AND group holding one
/// fresh condition is inserted right after the target. Siblings before the
/// target are never reused. The parent of a root group is the model's root
/// list.
pub fn append_and_condition_near(model: &Model, group_id: &NodeId) -> Edit {
    if let Some(index) = model.roots().iter().position(|root| &root.id == group_id) {
        let roots = grow_and_after(model.roots(), index);
        return finish(model, Some(Model::from_roots_unchecked(roots)), "new");
    }

    let rewritten = rewrite_parent_of(model, group_id, |parent| {
        let index = group_position(parent, group_id)?;
        let mut children = parent.conditions.clone();

        let reuse = parent.conditions[index + 1..]
            .iter()
            .enumerate()
            .find_map(|(offset, node)| match node {
                Node::Group(sibling) if sibling.is_and() => Some((index + 1 + offset, sibling)),
                _ => None,
            });

        match reuse {
            Some((position, sibling)) => {
                let mut grown = sibling.conditions.clone();
                grown.push(new_empty_condition().into());
                children[position] = sibling.with_children(grown).into();
            }
            None => {
                children.insert(index + 1, new_empty_group(GroupKind::And, None).into());
            }
        }
        Some(parent.with_children(children))
    });
    finish(model, rewritten, "new")
}

/// Lift the condition `condition_id` out of the group `group_id` into a new OR
/// group `[condition, fresh]` placed right after the group in its parent.
///
/// If the group empties it is dropped and the OR group takes its place. For a
/// root group the OR group becomes the next root; a model left with no roots
/// is reset to [`new_empty_model`].
pub fn split_condition_to_or_group(model: &Model, group_id: &NodeId, condition_id: &NodeId) -> Edit {
    if let Some(index) = model.roots().iter().position(|root| &root.id == group_id) {
        let root = &model.roots()[index];
        let Some((position, condition)) = condition_position(root, condition_id) else {
            return finish(model, None, "split");
        };
        let lifted = new_empty_group(GroupKind::Or, Some(Node::Condition(condition.clone())));
        let mut remaining = root.conditions.clone();
        remaining.remove(position);

        let mut roots = model.roots().to_vec();
        if remaining.is_empty() {
            roots[index] = Arc::new(lifted);
        } else {
            roots[index] = Arc::new(root.with_children(remaining));
            roots.insert(index + 1, Arc::new(lifted));
        }
        if roots.is_empty() {
            return (new_empty_model(), true);
        }
        return finish(model, Some(Model::from_roots_unchecked(roots)), "split");
    }

    let rewritten = rewrite_parent_of(model, group_id, |parent| {
        let index = group_position(parent, group_id)?;
        let group = parent.conditions[index].as_group()?;
        let (position, condition) = condition_position(group, condition_id)?;

        let lifted = new_empty_group(GroupKind::Or, Some(Node::Condition(condition.clone())));
        let mut remaining = group.conditions.clone();
        remaining.remove(position);

        let mut children = parent.conditions.clone();
        if remaining.is_empty() {
            children[index] = lifted.into();
        } else {
            children[index] = group.with_children(remaining).into();
            children.insert(index + 1, lifted.into());
        }
        Some(parent.with_children(children))
    });

    finish(model, rewritten, "split")
}

/// Outcome of deleting below one group.
enum Pruned {
    /// No descendant matched; keep the original `Arc`.
    Untouched,
    /// The group emptied and must be dropped by its parent.
    Removed,
    Rebuilt(Arc<Group>),
}

/// Delete the condition `condition_id` from the group `group_id`, dropping
/// groups that empty, collapsing single-child OR groups to AND and merging
/// adjacent AND groups along the way. Deleting the last condition of the
/// model resets it to [`new_empty_model`].
pub fn delete_condition(model: &Model, group_id: &NodeId, condition_id: &NodeId) -> Edit {
    let mut roots = Vec::with_capacity(model.roots().len());
    let mut changed = false;

    for root in model.roots() {
        if changed {
            roots.push(root.clone());
            continue;
        }
        match delete_in(root, group_id, condition_id) {
            Pruned::Untouched => roots.push(root.clone()),
            Pruned::Removed => changed = true,
            Pruned::Rebuilt(group) => {
                changed = true;
                roots.push(group);
            }
        }
    }

    if !changed {
        debug!(operation = "delete", "no matching node, model left as is");
        return unchanged(model);
    }
    if roots.is_empty() {
        debug!(operation = "delete", "last condition removed, model reset");
        return (new_empty_model(), true);
    }
    debug!(operation = "delete", "condition tree changed");
    (Model::from_roots_unchecked(roots), true)
}

fn delete_in(group: &Arc<Group>, group_id: &NodeId, condition_id: &NodeId) -> Pruned {
    let mut children = if &group.id == group_id {
        let Some((position, _)) = condition_position(group, condition_id) else {
            return Pruned::Untouched;
        };
        let mut children = group.conditions.clone();
        children.remove(position);
        children
    } else {
        let found = group.conditions.iter().enumerate().find_map(|(index, node)| {
            let child = node.as_group()?;
            match delete_in(child, group_id, condition_id) {
                Pruned::Untouched => None,
                outcome => Some((index, outcome)),
            }
        });
        let Some((index, outcome)) = found else {
            return Pruned::Untouched;
        };
        let mut children = group.conditions.clone();
        match outcome {
            Pruned::Rebuilt(child) => children[index] = Node::Group(child),
            _ => {
                children.remove(index);
            }
        }
        children
    };

    if children.is_empty() {
        return Pruned::Removed;
    }
    children = merge_adjacent_and(children);

    // merging may leave an OR with a single child, so collapse afterwards
    let kind = match group.kind {
        GroupKind::Or if children.len() == 1 => GroupKind::And,
        kind => kind,
    };
    Pruned::Rebuilt(Arc::new(Group {
        id: group.id.clone(),
        kind,
        conditions: children,
    }))
}

/// Fold each AND group into an AND group directly before it.
fn merge_adjacent_and(children: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(children.len());
    for node in children {
        let joined = match (merged.last(), &node) {
            (Some(Node::Group(previous)), Node::Group(next)) if previous.is_and() && next.is_and() => {
                let mut conditions = previous.conditions.clone();
                conditions.extend(next.conditions.iter().cloned());
                Some(previous.with_children(conditions))
            }
            _ => None,
        };
        match joined {
            Some(group) => {
                let last = merged.len() - 1;
                merged[last] = group.into();
            }
            None => merged.push(node),
        }
    }
    merged
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::test_utils::{apply_random_edit, is_normalized, parent_of_condition, shape};
    use proptest::prelude::*;
    use proptest::sample::Index;

    fn edits() -> impl Strategy<Value = Vec<(u8, Index)>> {
        prop::collection::vec((0u8..5, any::<Index>()), 0..30)
    }

    fn build(edits: &[(u8, Index)]) -> Model {
        edits
            .iter()
            .fold(new_empty_model(), |model, (op, index)| apply_random_edit(&model, *op, *index))
    }

    proptest! {
        #[test]
        fn test_add_then_delete_round_trips(edits in edits(), pick in any::<Index>()) {
            let model = build(&edits);
            prop_assume!(is_normalized(&model));
            let mut groups = Vec::new();
            crate::test_utils::collect_groups(&model, &mut groups);
            let target = pick.get(&groups).id.clone();

            let (added, changed) = add_condition_to_group(&model, &target);
            prop_assert!(changed);
            let group = added.find_group(&target).unwrap();
            let fresh = group.conditions.last().unwrap().id().clone();

            let (restored, changed) = delete_condition(&added, &target, &fresh);
            prop_assert!(changed);
            prop_assert_eq!(restored, model);
        }

        #[test]
        fn test_deleting_everything_yields_empty_model(edits in edits()) {
            let mut model = build(&edits);
            let leaves: Vec<NodeId> = model.conditions().iter().map(|c| c.id.clone()).collect();
            for leaf in leaves {
                let parent = parent_of_condition(&model, &leaf).unwrap();
                let (next, changed) = delete_condition(&model, &parent, &leaf);
                prop_assert!(changed);
                model = next;
            }
            prop_assert_eq!(shape(&model), "AND[AND[?]]");
        }

        #[test]
        fn test_random_edits_keep_groups_non_empty(edits in edits()) {
            let model = build(&edits);
            let mut groups = Vec::new();
            crate::test_utils::collect_groups(&model, &mut groups);
            prop_assert!(groups.iter().all(|group| !group.conditions.is_empty()));
        }
    }
}
