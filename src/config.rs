//! 配置模块，负责加载字段/运算符元数据 (JSON)
//!
//! 文件格式: 表名 → 字段名 → 元数据
//!
//! ```json
//! {
//!   "incident": {
//!     "active": { "label": "Active", "type": "boolean",
//!                 "operators": [{ "operator": "=", "label": "is" }] },
//!     "assigned_to": { "label": "Assigned to", "type": "reference",
//!                      "reference": "sys_user", "operators": [] }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::ast::ConditionPatch;
use crate::error::CatalogError;

/// 运算符及其展示文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorMeta {
    pub operator: String,
    pub label: String,
}

/// 选项型字段的可选值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// 单个字段的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub operators: Vec<OperatorMeta>,
    /// 引用字段指向的表, 点号路径据此继续解析
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

impl FieldMeta {
    pub fn operator(&self, operator: &str) -> Option<&OperatorMeta> {
        self.operators.iter().find(|meta| meta.operator == operator)
    }
}

/// 字段名到元数据的映射 (按字段名排序)
pub type FieldMap = BTreeMap<String, FieldMeta>;

/// 外部元数据提供者: 给定表名, 返回该表的字段映射
pub trait FieldMetadataProvider {
    fn fields(&self, table: &str) -> Result<&FieldMap, CatalogError>;
}

/// 点号路径解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField<'a> {
    /// 最后一段字段所在的表
    pub table: &'a str,
    pub meta: &'a FieldMeta,
    /// 各段标签以 " > " 连接
    pub label: String,
}

/// 字段元数据目录
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldCatalog {
    #[serde(flatten)]
    pub tables: HashMap<String, FieldMap>,
}

impl FieldCatalog {
    /// 从JSON文件加载元数据目录
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(CatalogError::NotFound(path_ref.to_path_buf()));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| CatalogError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;

        let tables: HashMap<String, FieldMap> =
            serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path_ref.to_path_buf(),
                source,
            })?;

        Ok(FieldCatalog { tables })
    }

    /// 解析点号路径 (例如 `assigned_to.department`), 沿引用字段逐段跳转
    pub fn resolve<'a>(&'a self, table: &'a str, path: &str) -> Option<ResolvedField<'a>> {
        let mut current_table = table;
        let mut labels = Vec::new();
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let meta = self.tables.get(current_table)?.get(segment)?;
            labels.push(meta.label.as_str());
            if segments.peek().is_none() {
                return Some(ResolvedField {
                    table: current_table,
                    meta,
                    label: labels.join(" > "),
                });
            }
            current_table = meta.reference.as_deref()?;
        }
        None
    }

    /// 选择字段时的更新: 设置字段及其展示信息, 清空运算符和值
    pub fn field_patch(&self, table: &str, path: &str) -> Option<ConditionPatch> {
        let resolved = self.resolve(table, path)?;
        let dot_walked = path.contains('.');
        Some(ConditionPatch {
            field: Some(path.to_string()),
            operator: Some(String::new()),
            value: Some(String::new()),
            field_label: Some(Some(resolved.label)),
            operator_label: Some(None),
            display_value: Some(None),
            field_type: Some(Some(resolved.meta.field_type.clone())),
            table: Some(dot_walked.then(|| resolved.table.to_string())),
        })
    }

    /// 选择运算符时的更新, 运算符必须属于该字段
    pub fn operator_patch(&self, table: &str, path: &str, operator: &str) -> Option<ConditionPatch> {
        let resolved = self.resolve(table, path)?;
        let meta = resolved.meta.operator(operator)?;
        Some(ConditionPatch {
            operator: Some(meta.operator.clone()),
            operator_label: Some(Some(meta.label.clone())),
            ..Default::default()
        })
    }

    /// 内置示例目录（用于测试或fallback）
    pub fn builtin() -> Self {
        let eq = |label: &str| OperatorMeta {
            operator: "=".to_string(),
            label: label.to_string(),
        };
        let op = |operator: &str, label: &str| OperatorMeta {
            operator: operator.to_string(),
            label: label.to_string(),
        };
        let field = |label: &str, field_type: &str, operators: Vec<OperatorMeta>| FieldMeta {
            label: label.to_string(),
            field_type: field_type.to_string(),
            operators,
            reference: None,
            choices: None,
        };

        let mut incident = FieldMap::new();
        incident.insert(
            "active".to_string(),
            field("Active", "boolean", vec![eq("is"), op("!=", "is not")]),
        );
        incident.insert(
            "priority".to_string(),
            FieldMeta {
                choices: Some(
                    (1..=5)
                        .map(|n| Choice {
                            value: n.to_string(),
                            label: n.to_string(),
                        })
                        .collect(),
                ),
                ..field(
                    "Priority",
                    "choice",
                    vec![eq("is"), op("!=", "is not"), op("<", "less than"), op(">", "greater than")],
                )
            },
        );
        incident.insert(
            "short_description".to_string(),
            field(
                "Short description",
                "string",
                vec![op("LIKE", "contains"), op("STARTSWITH", "starts with"), eq("is")],
            ),
        );
        incident.insert(
            "assigned_to".to_string(),
            FieldMeta {
                reference: Some("sys_user".to_string()),
                ..field("Assigned to", "reference", vec![eq("is"), op("ISEMPTY", "is empty")])
            },
        );

        let mut sys_user = FieldMap::new();
        sys_user.insert("name".to_string(), field("Name", "string", vec![eq("is")]));
        sys_user.insert(
            "department".to_string(),
            FieldMeta {
                reference: Some("cmn_department".to_string()),
                ..field("Department", "reference", vec![eq("is")])
            },
        );

        let mut cmn_department = FieldMap::new();
        cmn_department.insert("name".to_string(), field("Name", "string", vec![eq("is")]));

        let mut tables = HashMap::new();
        tables.insert("incident".to_string(), incident);
        tables.insert("sys_user".to_string(), sys_user);
        tables.insert("cmn_department".to_string(), cmn_department);
        Self { tables }
    }
}

impl FieldMetadataProvider for FieldCatalog {
    fn fields(&self, table: &str) -> Result<&FieldMap, CatalogError> {
        self.tables
            .get(table)
            .ok_or_else(|| CatalogError::UnknownTable(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "incident": {{
                    "active": {{ "label": "Active", "type": "boolean",
                                 "operators": [{{ "operator": "=", "label": "is" }}] }}
                }}
            }}"#
        )
        .unwrap();

        let catalog = FieldCatalog::from_json_file(file.path()).unwrap();
        let fields = catalog.fields("incident").unwrap();
        assert_eq!(fields["active"].label, "Active");
        assert_eq!(fields["active"].operator("=").unwrap().label, "is");
        assert!(matches!(catalog.fields("problem"), Err(CatalogError::UnknownTable(_))));
    }

    #[test]
    fn test_invalid_json_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "invalid json").unwrap();

        let result = FieldCatalog::from_json_file(file.path());
        assert!(matches!(result, Err(CatalogError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = FieldCatalog::from_json_file("non_existent_catalog.json");
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_resolve_dot_walked_field() {
        let catalog = FieldCatalog::builtin();
        let resolved = catalog.resolve("incident", "assigned_to.department.name").unwrap();
        assert_eq!(resolved.table, "cmn_department");
        assert_eq!(resolved.label, "Assigned to > Department > Name");

        // 非引用字段不能继续跳转
        assert!(catalog.resolve("incident", "active.name").is_none());
        assert!(catalog.resolve("incident", "unknown").is_none());
    }

    #[test]
    fn test_field_patch_resets_operator_and_value() {
        let catalog = FieldCatalog::builtin();
        let patch = catalog.field_patch("incident", "assigned_to.name").unwrap();
        assert_eq!(patch.field.as_deref(), Some("assigned_to.name"));
        assert_eq!(patch.operator.as_deref(), Some(""));
        assert_eq!(patch.value.as_deref(), Some(""));
        assert_eq!(patch.table, Some(Some("sys_user".to_string())));
        assert_eq!(patch.field_type, Some(Some("string".to_string())));

        let plain = catalog.field_patch("incident", "active").unwrap();
        assert_eq!(plain.table, Some(None));
    }

    #[test]
    fn test_operator_patch_checks_field_operators() {
        let catalog = FieldCatalog::builtin();
        let patch = catalog.operator_patch("incident", "priority", "<").unwrap();
        assert_eq!(patch.operator.as_deref(), Some("<"));
        assert_eq!(patch.operator_label, Some(Some("less than".to_string())));
        assert!(catalog.operator_patch("incident", "active", "<").is_none());
    }
}
