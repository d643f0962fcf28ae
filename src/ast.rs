//! 条件树的数据模型
//!
//! 节点通过 `Arc` 共享, 编辑操作只复制从根到修改点的路径,
//! 其余子树保持同一个引用 (可用 `Arc::ptr_eq` 判断)。

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// 节点的不透明标识符, 在整个编辑会话中稳定且不复用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// 生成一个新的标识符
    pub fn fresh() -> Self {
        NodeId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

/// 叶子节点: `field operator value` 形式的谓词
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: NodeId,
    /// 点号路径字段, 例如 `assigned_to.department`
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: String,

    // 以下仅用于展示, 编辑器和编码器不会解释它们
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    /// 点号路径字段解析后的目标表
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl Condition {
    /// 创建一个已配置的条件, 主要用于测试和从外部数据构造
    pub fn new(field: &str, operator: &str, value: &str) -> Self {
        Self {
            id: NodeId::fresh(),
            field: field.to_string(),
            operator: operator.to_string(),
            value: value.to_string(),
            field_label: None,
            operator_label: None,
            display_value: None,
            field_type: None,
            table: None,
        }
    }

    /// 字段或运算符为空的条件不能执行
    pub fn is_complete(&self) -> bool {
        !self.field.is_empty() && !self.operator.is_empty()
    }

    /// 应用部分更新, 返回新的条件 (id 不变)
    pub fn patched(&self, patch: &ConditionPatch) -> Self {
        let mut next = self.clone();
        if let Some(field) = &patch.field {
            next.field = field.clone();
        }
        if let Some(operator) = &patch.operator {
            next.operator = operator.clone();
        }
        if let Some(value) = &patch.value {
            next.value = value.clone();
        }
        if let Some(label) = &patch.field_label {
            next.field_label = label.clone();
        }
        if let Some(label) = &patch.operator_label {
            next.operator_label = label.clone();
        }
        if let Some(display) = &patch.display_value {
            next.display_value = display.clone();
        }
        if let Some(field_type) = &patch.field_type {
            next.field_type = field_type.clone();
        }
        if let Some(table) = &patch.table {
            next.table = table.clone();
        }
        next
    }
}

/// 条件的部分更新。`None` 表示保持原值;
/// 展示字段使用 `Some(None)` 表示清除。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionPatch {
    pub field: Option<String>,
    pub operator: Option<String>,
    pub value: Option<String>,
    pub field_label: Option<Option<String>>,
    pub operator_label: Option<Option<String>>,
    pub display_value: Option<Option<String>>,
    pub field_type: Option<Option<String>>,
    pub table: Option<Option<String>>,
}

impl ConditionPatch {
    pub fn field(field: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            ..Default::default()
        }
    }

    pub fn operator(operator: &str) -> Self {
        Self {
            operator: Some(operator.to_string()),
            ..Default::default()
        }
    }

    pub fn value(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    /// 一次设置字段, 运算符和值
    pub fn predicate(field: &str, operator: &str, value: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }
}

/// 分组类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// 逻辑与 (AND)
    And,
    /// 逻辑或 (OR)
    Or,
}

/// AND/OR 分组, 子节点顺序决定编码顺序和展示顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    pub conditions: Vec<Node>,
}

impl Group {
    pub fn new(kind: GroupKind, conditions: Vec<Node>) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            conditions,
        }
    }

    /// 保留 id 与类型, 替换子节点
    pub fn with_children(&self, conditions: Vec<Node>) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            conditions,
        }
    }

    pub fn is_and(&self) -> bool {
        self.kind == GroupKind::And
    }

    /// 深度优先、从左到右的叶子数量
    pub fn leaf_count(&self) -> usize {
        self.conditions
            .iter()
            .map(|node| match node {
                Node::Condition(_) => 1,
                Node::Group(group) => group.leaf_count(),
            })
            .sum()
    }

    /// 在本组及其后代中按 id 深度优先查找分组
    pub fn find_group(&self, id: &NodeId) -> Option<&Arc<Group>> {
        for node in &self.conditions {
            if let Node::Group(group) = node {
                if &group.id == id {
                    return Some(group);
                }
                if let Some(found) = group.find_group(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// 本组的直接子条件
    pub fn child_condition(&self, id: &NodeId) -> Option<&Arc<Condition>> {
        self.conditions.iter().find_map(|node| match node {
            Node::Condition(condition) if &condition.id == id => Some(condition),
            _ => None,
        })
    }
}

/// 树节点: 叶子条件或分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Condition(Arc<Condition>),
    Group(Arc<Group>),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Condition(condition) => &condition.id,
            Node::Group(group) => &group.id,
        }
    }

    pub fn as_group(&self) -> Option<&Arc<Group>> {
        match self {
            Node::Group(group) => Some(group),
            Node::Condition(_) => None,
        }
    }

    /// 同一个引用 (结构共享检查)
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Condition(a), Node::Condition(b)) => Arc::ptr_eq(a, b),
            (Node::Group(a), Node::Group(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Condition> for Node {
    fn from(condition: Condition) -> Self {
        Node::Condition(Arc::new(condition))
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Node::Group(Arc::new(group))
    }
}

/// 根分组的有序列表, 每个根分组是一个独立的查询段 (以 `^NQ` 连接)。
/// 永远不为空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Model {
    roots: Vec<Arc<Group>>,
}

impl Model {
    /// 从外部数据 (例如远程解码结果) 构造, 校验结构不变量
    pub fn from_roots(roots: Vec<Arc<Group>>) -> Result<Self, ModelError> {
        if roots.is_empty() {
            return Err(ModelError::NoRootGroups);
        }
        let mut seen = HashSet::new();
        for root in &roots {
            check_group(root, &mut seen)?;
        }
        Ok(Self { roots })
    }

    /// 编辑器内部使用: 调用方保证 `roots` 非空
    pub(crate) fn from_roots_unchecked(roots: Vec<Arc<Group>>) -> Self {
        assert!(!roots.is_empty(), "a model must keep at least one root group");
        Self { roots }
    }

    pub fn roots(&self) -> &[Arc<Group>] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<Arc<Group>> {
        self.roots
    }

    /// 所有根分组都是同一个引用
    pub fn ptr_eq(&self, other: &Model) -> bool {
        self.roots.len() == other.roots.len()
            && self
                .roots
                .iter()
                .zip(&other.roots)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    pub fn leaf_count(&self) -> usize {
        self.roots.iter().map(|root| root.leaf_count()).sum()
    }

    pub fn root_leaf_count(&self, root_index: usize) -> Option<usize> {
        self.roots.get(root_index).map(|root| root.leaf_count())
    }

    /// 深度优先查找分组 (包括根分组)
    pub fn find_group(&self, id: &NodeId) -> Option<&Arc<Group>> {
        self.roots.iter().find_map(|root| {
            if &root.id == id {
                Some(root)
            } else {
                root.find_group(id)
            }
        })
    }

    /// 查找分组中的直接子条件
    pub fn find_condition(&self, group_id: &NodeId, condition_id: &NodeId) -> Option<&Arc<Condition>> {
        self.find_group(group_id)
            .and_then(|group| group.child_condition(condition_id))
    }

    /// 深度优先、从左到右遍历所有叶子
    pub fn conditions(&self) -> Vec<&Arc<Condition>> {
        fn walk<'a>(group: &'a Group, out: &mut Vec<&'a Arc<Condition>>) {
            for node in &group.conditions {
                match node {
                    Node::Condition(condition) => out.push(condition),
                    Node::Group(child) => walk(child, out),
                }
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, &mut out);
        }
        out
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roots = Vec::<Arc<Group>>::deserialize(deserializer)?;
        Model::from_roots(roots).map_err(serde::de::Error::custom)
    }
}

fn check_group(group: &Group, seen: &mut HashSet<NodeId>) -> Result<(), ModelError> {
    if !seen.insert(group.id.clone()) {
        return Err(ModelError::DuplicateId(group.id.clone()));
    }
    if group.conditions.is_empty() {
        return Err(ModelError::EmptyGroup(group.id.clone()));
    }
    for node in &group.conditions {
        match node {
            Node::Condition(condition) => {
                if !seen.insert(condition.id.clone()) {
                    return Err(ModelError::DuplicateId(condition.id.clone()));
                }
            }
            Node::Group(child) => check_group(child, seen)?,
        }
    }
    Ok(())
}
