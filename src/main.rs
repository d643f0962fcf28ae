use std::convert::Infallible;
use std::fs;

use anyhow::{bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use condition_builder::ast::{Group, Model, Node, NodeId};
use condition_builder::config::{FieldCatalog, FieldMetadataProvider};
use condition_builder::truncate::Join;
use condition_builder::{ConditionPatch, QueryExecutor, Session, SessionError};

const DEFAULT_CATALOG: &str = "field_catalog.json";

const HELP: &str = "\
命令:
  show                      显示条件树
  fields                    列出当前表的字段
  set <cond> <field>        选择字段 (支持点号路径)
  op <cond> <operator>      选择运算符
  value <cond> <value...>   设置值
  add <group>               在分组中追加条件
  new <group>               在分组之后追加 AND 条件
  split <cond>              把条件拆分为 OR 分组
  del <cond>                删除条件
  crumbs                    显示面包屑
  trunc <n>                 截断到第 n 个面包屑
  query                     显示编码查询 (不校验)
  run                       校验并执行查询
  load <file.json>          从 JSON 载入条件树
  reset                     清空条件树
  quit                      退出
节点 id 可以只写前缀。";

/// 把编码查询打印到标准输出, 代替真实的查询服务
struct StdoutExecutor;

impl QueryExecutor for StdoutExecutor {
    type Error = Infallible;

    fn execute(&mut self, table: &str, encoded_query: &str) -> Result<(), Infallible> {
        println!("▶ {}?sysparm_query={}", table, encoded_query);
        Ok(())
    }
}

/// 加载元数据目录，失败时使用内置目录
fn load_catalog(path: &str) -> FieldCatalog {
    match FieldCatalog::from_json_file(path) {
        Ok(catalog) => {
            println!("✅ 成功从JSON文件加载字段目录: {}", path);
            catalog
        }
        Err(e) => {
            println!("⚠️ 无法加载字段目录 ({}), 使用内置目录", e);
            FieldCatalog::builtin()
        }
    }
}

fn collect_groups<'a>(group: &'a Group, out: &mut Vec<&'a Group>) {
    out.push(group);
    for node in &group.conditions {
        if let Node::Group(child) = node {
            collect_groups(child, out);
        }
    }
}

fn all_groups(model: &Model) -> Vec<&Group> {
    let mut out = Vec::new();
    for root in model.roots() {
        collect_groups(root, &mut out);
    }
    out
}

/// 按前缀唯一匹配分组 id
fn resolve_group(model: &Model, prefix: &str) -> Result<NodeId> {
    let matches: Vec<_> = all_groups(model)
        .into_iter()
        .filter(|group| group.id.as_str().starts_with(prefix))
        .map(|group| group.id.clone())
        .collect();
    match matches.as_slice() {
        [id] => Ok(id.clone()),
        [] => bail!("没有匹配 '{}' 的分组", prefix),
        _ => bail!("'{}' 匹配了多个分组", prefix),
    }
}

/// 按前缀唯一匹配条件, 返回 (所在分组 id, 条件 id)
fn resolve_condition(model: &Model, prefix: &str) -> Result<(NodeId, NodeId)> {
    let mut matches = Vec::new();
    for group in all_groups(model) {
        for node in &group.conditions {
            if let Node::Condition(condition) = node {
                if condition.id.as_str().starts_with(prefix) {
                    matches.push((group.id.clone(), condition.id.clone()));
                }
            }
        }
    }
    if matches.len() != 1 {
        bail!("'{}' 匹配了 {} 个条件", prefix, matches.len());
    }
    Ok(matches.remove(0))
}

/// 前 8 个字符 (按字符而非字节截断)
fn short(id: &NodeId) -> &str {
    let s = id.as_str();
    s.char_indices().nth(8).map_or(s, |(i, _)| &s[..i])
}

fn print_group(group: &Group, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{:?} [{}]", indent, group.kind, short(&group.id));
    for node in &group.conditions {
        match node {
            Node::Group(child) => print_group(child, depth + 1),
            Node::Condition(c) => {
                let text = if c.is_complete() || !c.field.is_empty() {
                    format!(
                        "{} {} {}",
                        c.field_label.as_deref().unwrap_or(&c.field),
                        c.operator_label.as_deref().unwrap_or(&c.operator),
                        c.display_value.as_deref().unwrap_or(&c.value)
                    )
                } else {
                    "(空条件)".to_string()
                };
                println!("{}  [{}] {}", indent, short(&c.id), text.trim_end());
            }
        }
    }
}

fn show(model: &Model) {
    for (index, root) in model.roots().iter().enumerate() {
        if index > 0 {
            println!("-- 新查询 --");
        }
        print_group(root, 0);
    }
}

fn report(changed: bool) {
    if !changed {
        println!("(未改变)");
    }
}

fn arg<'a>(args: &[&'a str], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .copied()
        .with_context(|| format!("缺少参数 <{}>", name))
}

fn execute_command(session: &mut Session, catalog: &FieldCatalog, line: &str) -> Result<bool> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, rest)) = args.split_first() else {
        return Ok(true);
    };
    let table = session.table().to_string();

    match command {
        "help" | "?" => println!("{}", HELP),
        "quit" | "exit" => return Ok(false),
        "show" => show(session.model()),
        "fields" => {
            for (name, meta) in catalog.fields(&table)? {
                let operators: Vec<_> = meta.operators.iter().map(|o| o.operator.as_str()).collect();
                println!("  {:<20} {:<20} {}", name, meta.label, operators.join(" "));
            }
        }
        "set" => {
            let (group, condition) = resolve_condition(session.model(), arg(rest, 0, "cond")?)?;
            let field = arg(rest, 1, "field")?;
            let patch = catalog
                .field_patch(&table, field)
                .with_context(|| format!("表 {} 中没有字段 {}", table, field))?;
            report(session.update_condition(&group, &condition, &patch));
        }
        "op" => {
            let (group, condition) = resolve_condition(session.model(), arg(rest, 0, "cond")?)?;
            let operator = arg(rest, 1, "operator")?;
            let field = session
                .model()
                .find_condition(&group, &condition)
                .map(|c| c.field.clone())
                .unwrap_or_default();
            let patch = catalog
                .operator_patch(&table, &field, operator)
                .with_context(|| format!("字段 '{}' 不支持运算符 {}", field, operator))?;
            report(session.update_condition(&group, &condition, &patch));
        }
        "value" => {
            let (group, condition) = resolve_condition(session.model(), arg(rest, 0, "cond")?)?;
            let value = rest.get(1..).unwrap_or_default().join(" ");
            report(session.update_condition(&group, &condition, &ConditionPatch::value(&value)));
        }
        "add" => {
            let group = resolve_group(session.model(), arg(rest, 0, "group")?)?;
            report(session.add_condition(&group));
        }
        "new" => {
            let group = resolve_group(session.model(), arg(rest, 0, "group")?)?;
            report(session.append_and_condition(&group));
        }
        "split" => {
            let (group, condition) = resolve_condition(session.model(), arg(rest, 0, "cond")?)?;
            report(session.split_condition(&group, &condition));
        }
        "del" => {
            let (group, condition) = resolve_condition(session.model(), arg(rest, 0, "cond")?)?;
            report(session.delete_condition(&group, &condition));
        }
        "crumbs" => {
            for (index, crumb) in session.breadcrumbs().iter().enumerate() {
                let join = match crumb.join {
                    None => "",
                    Some(Join::And) => "and ",
                    Some(Join::Or) => "or ",
                    Some(Join::NewQuery) => "new query: ",
                };
                println!("  {:>2}. {}{}", index, join, crumb.label);
            }
        }
        "trunc" => {
            let index: usize = arg(rest, 0, "n")?.parse().context("n 必须是数字")?;
            let crumbs = session.breadcrumbs();
            let crumb = crumbs.get(index).with_context(|| format!("没有第 {} 个面包屑", index))?;
            report(session.truncate_to(crumb));
        }
        "query" => println!("{}", session.encoded_query(false).unwrap_or_default()),
        "run" => match session.run_query(&mut StdoutExecutor) {
            Ok(_) => {}
            Err(SessionError::IncompleteConditions(ids)) => {
                let ids: Vec<_> = ids.iter().map(short).collect();
                println!("✗ 请先完成所有条件: {}", ids.join(", "));
            }
            Err(e) => return Err(e.into()),
        },
        "load" => {
            let path = arg(rest, 0, "file.json")?;
            let json = fs::read_to_string(path).with_context(|| format!("无法读取 {}", path))?;
            let model: Model = serde_json::from_str(&json).with_context(|| format!("无法解析 {}", path))?;
            session.replace_model(model);
        }
        "reset" => session.reset(),
        other => println!("未知命令: {} (输入 help 查看帮助)", other),
    }
    Ok(true)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let table = args.next().unwrap_or_else(|| "incident".to_string());
    let catalog_path = args.next().unwrap_or_else(|| DEFAULT_CATALOG.to_string());

    println!("--- Condition Builder: 条件树编辑器 ---");
    let catalog = load_catalog(&catalog_path);
    let mut session = Session::new(table);
    println!("表: {} (输入 help 查看帮助)", session.table());
    show(session.model());

    let mut editor = DefaultEditor::new().context("无法初始化命令行编辑器")?;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match execute_command(&mut session, &catalog, &line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("✗ {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_respects_char_boundaries() {
        assert_eq!(short(&NodeId::from("0123456789abcdef")), "01234567");
        assert_eq!(short(&NodeId::from("abc")), "abc");
        assert_eq!(short(&NodeId::from("条件条件条件条件条件")), "条件条件条件条件");
        assert_eq!(short(&NodeId::from("ééééééééé")), "éééééééé");
    }

    #[test]
    fn test_resolve_condition_by_prefix() {
        let json = r#"[{"id": "根分组", "type": "and", "conditions": [
            {"kind": "condition", "id": "条件一", "field": "a", "operator": "=", "value": "1"},
            {"kind": "condition", "id": "条件二", "field": "b", "operator": "=", "value": "2"}
        ]}]"#;
        let model: Model = serde_json::from_str(json).unwrap();
        let (group, condition) = resolve_condition(&model, "条件二").unwrap();
        assert_eq!(group, NodeId::from("根分组"));
        assert_eq!(condition, NodeId::from("条件二"));
        assert!(resolve_condition(&model, "条件").is_err());
        assert_eq!(resolve_group(&model, "根").unwrap(), NodeId::from("根分组"));
    }
}
