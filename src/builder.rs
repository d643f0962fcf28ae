//! 空节点构造器, 会话开始时以及编辑操作需要新节点时使用

use std::sync::Arc;

use crate::ast::{Condition, Group, GroupKind, Model, Node, NodeId};

/// 新的空条件: 新 id, 字段、运算符、值均为空
pub fn new_empty_condition() -> Condition {
    Condition {
        id: NodeId::fresh(),
        field: String::new(),
        operator: String::new(),
        value: String::new(),
        field_label: None,
        operator_label: None,
        display_value: None,
        field_type: None,
        table: None,
    }
}

/// 新分组。带 `seed` 时为 `[seed, 空条件]` (把条件提升为 OR 时使用),
/// 否则为 `[空条件]`。
pub fn new_empty_group(kind: GroupKind, seed: Option<Node>) -> Group {
    let mut conditions = Vec::with_capacity(2);
    if let Some(seed) = seed {
        conditions.push(seed);
    }
    conditions.push(new_empty_condition().into());
    Group::new(kind, conditions)
}

/// 新模型: 一个根 AND 分组, 内含一个 AND 分组, 其中只有一个空条件。
/// 内层分组让 "新增分组" 和 "在附近新增条件" 总有一个非根 AND 分组可依附。
pub fn new_empty_model() -> Model {
    let inner = new_empty_group(GroupKind::And, None);
    let root = Group::new(GroupKind::And, vec![inner.into()]);
    Model::from_roots_unchecked(vec![Arc::new(root)])
}
