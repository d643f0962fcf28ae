//! Encoder that renders a condition tree to the encoded query grammar.
//!
//! ```text
//! predicate   <field><operator><value>     (no delimiters)
//! AND join    ^
//! OR join     ^OR
//! new query   ^NQ                           (between root groups)
//! ```

use crate::ast::{Condition, Group, GroupKind, Model, Node, NodeId};

pub const AND_SEPARATOR: &str = "^";
pub const OR_SEPARATOR: &str = "^OR";
pub const NEW_QUERY_SEPARATOR: &str = "^NQ";

/// Ids of every condition missing a field or an operator, depth-first.
pub fn incomplete_conditions(model: &Model) -> Vec<NodeId> {
    model
        .conditions()
        .into_iter()
        .filter(|condition| !condition.is_complete())
        .map(|condition| condition.id.clone())
        .collect()
}

/// Encode `model`. In strict mode any incomplete condition makes the whole
/// query invalid and `None` is returned; the caller must not run it.
pub fn serialize_model(model: &Model, strict: bool) -> Option<String> {
    if strict && model.conditions().iter().any(|condition| !condition.is_complete()) {
        return None;
    }
    Some(join_non_empty(model.roots().iter().map(|root| encode_group(root)), NEW_QUERY_SEPARATOR))
}

/// Renders nothing for a condition missing its field or operator.
pub fn encode_condition(condition: &Condition) -> String {
    if !condition.is_complete() {
        return String::new();
    }
    let mut out = String::with_capacity(condition.field.len() + condition.operator.len() + condition.value.len());
    out.push_str(&condition.field);
    out.push_str(&condition.operator);
    out.push_str(&condition.value);
    out
}

pub fn encode_group(group: &Group) -> String {
    let separator = match group.kind {
        GroupKind::And => AND_SEPARATOR,
        GroupKind::Or => OR_SEPARATOR,
    };
    let parts = group.conditions.iter().map(|node| match node {
        Node::Condition(condition) => encode_condition(condition),
        Node::Group(child) => encode_group(child),
    });
    join_non_empty(parts, separator)
}

fn join_non_empty(parts: impl Iterator<Item = String>, separator: &str) -> String {
    parts
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}
