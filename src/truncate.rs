//! Breadcrumb support: list the leaves of a model as a flat trail and cut the
//! model back to any point on it.
//!
//! Leaves are numbered per root group, depth-first and left to right, starting
//! at 0. Truncation keeps everything up to and including one leaf and drops
//! the rest. It does not collapse OR groups or merge AND groups afterwards.

use std::sync::Arc;

use tracing::debug;

use crate::ast::{Group, GroupKind, Model, Node, NodeId};
use crate::builder::new_empty_model;
use crate::editor::Edit;

/// Separator rendered in front of a breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    And,
    Or,
    NewQuery,
}

impl From<GroupKind> for Join {
    fn from(kind: GroupKind) -> Self {
        match kind {
            GroupKind::And => Join::And,
            GroupKind::Or => Join::Or,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub root_index: usize,
    pub leaf_ordinal: usize,
    pub condition_id: NodeId,
    /// `None` for the very first leaf of the model.
    pub join: Option<Join>,
    /// Display labels when present, raw field/operator/value otherwise.
    pub label: String,
}

/// One breadcrumb per leaf, in display order.
pub fn breadcrumbs(model: &Model) -> Vec<Breadcrumb> {
    fn walk(group: &Group, root_index: usize, join: Option<Join>, out: &mut Vec<Breadcrumb>, ordinal: &mut usize) {
        for (position, node) in group.conditions.iter().enumerate() {
            let join = if position == 0 { join } else { Some(group.kind.into()) };
            match node {
                Node::Condition(condition) => {
                    let parts = [
                        condition.field_label.as_deref().unwrap_or(&condition.field),
                        condition.operator_label.as_deref().unwrap_or(&condition.operator),
                        condition.display_value.as_deref().unwrap_or(&condition.value),
                    ];
                    let label = parts
                        .iter()
                        .filter(|part| !part.is_empty())
                        .copied()
                        .collect::<Vec<_>>()
                        .join(" ");
                    out.push(Breadcrumb {
                        root_index,
                        leaf_ordinal: *ordinal,
                        condition_id: condition.id.clone(),
                        join,
                        label,
                    });
                    *ordinal += 1;
                }
                Node::Group(child) => walk(child, root_index, join, out, ordinal),
            }
        }
    }

    let mut out = Vec::with_capacity(model.leaf_count());
    for (root_index, root) in model.roots().iter().enumerate() {
        let join = (root_index > 0).then_some(Join::NewQuery);
        walk(root, root_index, join, &mut out, &mut 0);
    }
    out
}

enum Kept {
    Whole,
    Part(Arc<Group>),
    Nothing,
}

/// Keep at most `*budget` leaves of `group`, consuming the budget.
fn prune(group: &Arc<Group>, budget: &mut usize) -> Kept {
    let mut kept = Vec::new();
    let mut whole = true;
    for node in &group.conditions {
        if *budget == 0 {
            whole = false;
            break;
        }
        match node {
            Node::Condition(_) => {
                kept.push(node.clone());
                *budget -= 1;
            }
            Node::Group(child) => match prune(child, budget) {
                Kept::Whole => kept.push(node.clone()),
                Kept::Part(part) => {
                    whole = false;
                    kept.push(Node::Group(part));
                }
                Kept::Nothing => whole = false,
            },
        }
    }

    if whole {
        Kept::Whole
    } else if kept.is_empty() {
        Kept::Nothing
    } else {
        Kept::Part(Arc::new(group.with_children(kept)))
    }
}

/// Cut the model back to leaf `leaf_ordinal` of root `root_index`.
///
/// Earlier roots are kept by reference, later roots are dropped. An
/// out-of-range root index is a no-op.
pub fn truncate_model_at_index(model: &Model, root_index: usize, leaf_ordinal: usize) -> Edit {
    let Some(root) = model.roots().get(root_index) else {
        debug!(root_index, "truncate target out of range, model left as is");
        return (model.clone(), false);
    };

    let mut budget = leaf_ordinal.saturating_add(1);
    let mut roots = model.roots()[..root_index].to_vec();
    let mut changed = root_index + 1 < model.roots().len();
    match prune(root, &mut budget) {
        Kept::Whole => roots.push(root.clone()),
        Kept::Part(part) => {
            changed = true;
            roots.push(part);
        }
        Kept::Nothing => changed = true,
    }

    if !changed {
        return (model.clone(), false);
    }
    debug!(root_index, leaf_ordinal, "model truncated");
    if roots.is_empty() {
        return (new_empty_model(), true);
    }
    (Model::from_roots_unchecked(roots), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{and, leaf, model, or, shape};
    use pretty_assertions::assert_eq;

    fn sample() -> Model {
        model(vec![
            and("r0", vec![leaf("a", "a", "=", "1")]),
            and(
                "r1",
                vec![
                    leaf("b", "b", "=", "2"),
                    or("o", vec![leaf("c", "c", "=", "3"), leaf("d", "d", "=", "4")]),
                    and("g", vec![leaf("e", "e", "=", "5")]),
                ],
            ),
            and("r2", vec![leaf("f", "f", "=", "6")]),
        ])
    }

    #[test]
    fn test_truncate_inside_nested_or() {
        let before = sample();
        let (after, changed) = truncate_model_at_index(&before, 1, 1);
        assert!(changed);
        // the single-child OR is left alone
        assert_eq!(shape(&after), "AND[a=1] | AND[b=2, OR[c=3]]");
        assert!(Arc::ptr_eq(&after.roots()[0], &before.roots()[0]));
        assert_eq!(after.find_group(&NodeId::from("o")).unwrap().kind, GroupKind::Or);
    }

    #[test]
    fn test_truncate_keeps_whole_subtrees_by_reference() {
        let before = sample();
        let (after, changed) = truncate_model_at_index(&before, 1, 2);
        assert!(changed);
        assert_eq!(shape(&after), "AND[a=1] | AND[b=2, OR[c=3, d=4]]");
        assert!(after.roots()[1].conditions[1].ptr_eq(&before.roots()[1].conditions[1]));
    }

    #[test]
    fn test_truncate_at_end_of_root_drops_later_roots() {
        let before = sample();
        let (after, changed) = truncate_model_at_index(&before, 1, 10);
        assert!(changed);
        assert_eq!(after.roots().len(), 2);
        assert!(Arc::ptr_eq(&after.roots()[1], &before.roots()[1]));
    }

    #[test]
    fn test_truncate_at_last_leaf_is_noop() {
        let before = sample();
        let (after, changed) = truncate_model_at_index(&before, 2, 0);
        assert!(!changed);
        assert!(after.ptr_eq(&before));
    }

    #[test]
    fn test_truncate_out_of_range_is_noop() {
        let before = sample();
        let (after, changed) = truncate_model_at_index(&before, 3, 0);
        assert!(!changed);
        assert!(after.ptr_eq(&before));
    }

    #[test]
    fn test_breadcrumb_trail() {
        let mut before = sample();
        let (labelled, _) = crate::editor::update_condition(
            &before,
            &NodeId::from("r0"),
            &NodeId::from("a"),
            &crate::ast::ConditionPatch {
                field_label: Some(Some("Active".to_string())),
                operator_label: Some(Some("is".to_string())),
                ..Default::default()
            },
        );
        before = labelled;

        let crumbs = breadcrumbs(&before);
        let summary: Vec<_> = crumbs
            .iter()
            .map(|c| (c.root_index, c.leaf_ordinal, c.join, c.label.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 0, None, "Active is 1"),
                (1, 0, Some(Join::NewQuery), "b = 2"),
                (1, 1, Some(Join::And), "c = 3"),
                (1, 2, Some(Join::Or), "d = 4"),
                (1, 3, Some(Join::And), "e = 5"),
                (2, 0, Some(Join::NewQuery), "f = 6"),
            ]
        );
    }

    #[test]
    fn test_breadcrumb_of_empty_condition() {
        let crumbs = breadcrumbs(&new_empty_model());
        assert_eq!(crumbs.len(), 1);
        assert_eq!(crumbs[0].label, "");
        assert_eq!(crumbs[0].join, None);
    }
}
