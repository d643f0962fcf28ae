//! Tree builders and inspection helpers for unit tests.

use std::sync::Arc;

use proptest::sample::Index;

use crate::ast::{Condition, ConditionPatch, Group, GroupKind, Model, Node, NodeId};
use crate::editor::{
    add_condition_to_group, append_and_condition_near, delete_condition, split_condition_to_or_group,
    update_condition,
};

pub fn leaf(id: &str, field: &str, operator: &str, value: &str) -> Node {
    let mut condition = Condition::new(field, operator, value);
    condition.id = NodeId::from(id);
    condition.into()
}

fn group(id: &str, kind: GroupKind, conditions: Vec<Node>) -> Node {
    Group {
        id: NodeId::from(id),
        kind,
        conditions,
    }
    .into()
}

pub fn and(id: &str, conditions: Vec<Node>) -> Node {
    group(id, GroupKind::And, conditions)
}

pub fn or(id: &str, conditions: Vec<Node>) -> Node {
    group(id, GroupKind::Or, conditions)
}

pub fn model(roots: Vec<Node>) -> Model {
    let roots = roots
        .into_iter()
        .map(|node| match node {
            Node::Group(group) => group,
            Node::Condition(_) => panic!("roots must be groups"),
        })
        .collect();
    Model::from_roots(roots).unwrap()
}

/// Id-free rendering used to compare tree shapes: complete leaves print as
/// `field op value` run together, unconfigured ones as `?`.
pub fn shape(model: &Model) -> String {
    fn node(node: &Node) -> String {
        match node {
            Node::Condition(c) if c.is_complete() => format!("{}{}{}", c.field, c.operator, c.value),
            Node::Condition(_) => "?".to_string(),
            Node::Group(g) => group(g),
        }
    }
    fn group(group: &Group) -> String {
        let kind = match group.kind {
            GroupKind::And => "AND",
            GroupKind::Or => "OR",
        };
        let children: Vec<_> = group.conditions.iter().map(node).collect();
        format!("{}[{}]", kind, children.join(", "))
    }
    model.roots().iter().map(|root| group(root)).collect::<Vec<_>>().join(" | ")
}

pub fn collect_groups(model: &Model, out: &mut Vec<Arc<Group>>) {
    fn walk(group: &Arc<Group>, out: &mut Vec<Arc<Group>>) {
        out.push(group.clone());
        for node in &group.conditions {
            if let Node::Group(child) = node {
                walk(child, out);
            }
        }
    }
    for root in model.roots() {
        walk(root, out);
    }
}

/// `(group id, condition id)` for every leaf, depth-first.
pub fn leaf_locations(model: &Model) -> Vec<(NodeId, NodeId)> {
    let mut groups = Vec::new();
    collect_groups(model, &mut groups);
    groups
        .iter()
        .flat_map(|group| {
            group.conditions.iter().filter_map(move |node| match node {
                Node::Condition(c) => Some((group.id.clone(), c.id.clone())),
                Node::Group(_) => None,
            })
        })
        .collect()
}

pub fn parent_of_condition(model: &Model, condition_id: &NodeId) -> Option<NodeId> {
    leaf_locations(model)
        .into_iter()
        .find(|(_, id)| id == condition_id)
        .map(|(group, _)| group)
}

/// No single-child OR groups and no adjacent AND siblings anywhere.
pub fn is_normalized(model: &Model) -> bool {
    let mut groups = Vec::new();
    collect_groups(model, &mut groups);
    groups.iter().all(|group| {
        let lone_or = group.kind == GroupKind::Or && group.conditions.len() == 1;
        let adjacent_and = group.conditions.windows(2).any(|pair| {
            matches!((&pair[0], &pair[1]), (Node::Group(a), Node::Group(b)) if a.is_and() && b.is_and())
        });
        !lone_or && !adjacent_and
    })
}

/// One random editor operation picked by `op`, aimed at the node chosen by
/// `index`. Used to grow arbitrary models in property tests.
pub fn apply_random_edit(model: &Model, op: u8, index: Index) -> Model {
    let mut groups = Vec::new();
    collect_groups(model, &mut groups);
    let leaves = leaf_locations(model);
    let group_id = index.get(&groups).id.clone();

    let (next, _) = match op {
        0 => add_condition_to_group(model, &group_id),
        1 => append_and_condition_near(model, &group_id),
        2 => {
            let (group, condition) = index.get(&leaves);
            split_condition_to_or_group(model, group, condition)
        }
        3 => {
            let (group, condition) = index.get(&leaves);
            delete_condition(model, group, condition)
        }
        _ => {
            let (group, condition) = index.get(&leaves);
            let patch = ConditionPatch::predicate("field", "=", &index.index(100).to_string());
            update_condition(model, group, condition, &patch)
        }
    };
    next
}
