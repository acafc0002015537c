//! 动作解析：从模型自由文本中提取唯一的 Tool Call
//!
//! 纯函数、无副作用。格式不对时返回 None 而不是错误，由任务循环计入格式错误。
//! 平衡括号提取与宽松 JSON 解析同时供分析子程序复用。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// 已解析并清洗的动作：名称非空、所有字符串叶子已去除首尾空白
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    name: String,
    arguments: Map<String, Value>,
}

impl ActionDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    /// 参数的紧凑文本表示（用于危险判定、日志、确认提示）
    pub fn arguments_text(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }

    #[cfg(test)]
    pub(crate) fn for_test(name: &str, arguments: Value) -> Self {
        let arguments = match trim_strings(arguments) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.to_string(),
            arguments,
        }
    }
}

fn template_artifacts() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<\|[^|]+\|>").expect("static regex"))
}

/// 从第一个 `{` 开始按花括号深度扫描，返回首个深度回到 0 的完整片段
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 严格解析，失败则把单引号替换为双引号再试一次
pub fn parse_lenient(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&candidate.replace('\'', "\"")).ok())
}

/// 提取并解析文本中的第一个 JSON 对象（非对象视为失败）
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    match parse_lenient(extract_json_object(text)?)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// 递归去除字符串叶子的首尾空白
fn trim_strings(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(trim_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, trim_strings(v)))
                .collect(),
        ),
        other => other,
    }
}

/// 解析模型输出：{"tool"|"name": "...", "args"|"arguments": {...}}，可前后夹带说明文字
pub fn parse_action(output: &str) -> Option<ActionDescriptor> {
    let cleaned = template_artifacts().replace_all(output, "");
    let mut object = parse_json_object(&cleaned)?;

    let name = ["tool", "name"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let arguments = ["args", "arguments"]
        .iter()
        .find_map(|key| object.remove(*key))
        .map(trim_strings);
    let arguments = match arguments {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Some(ActionDescriptor { name, arguments })
}
