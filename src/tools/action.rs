//! 动作注册表：模型可调用的固定动作集合
//!
//! 每个动作是 BrowserAction 的一个变体，自带已校验的参数；from_descriptor 在一处完成
//! 名称解析与参数取值。参数缺失或类型不对时退化为文档中的默认值，不会报错。

use serde_json::{Map, Value};
use thiserror::Error;

use crate::analysis::AnalysisKind;
use crate::react::ActionDescriptor;

pub const NAVIGATE: &str = "navigate";
pub const EXTRACT_PAGE_SNAPSHOT: &str = "extract_page_snapshot";
pub const EXTRACT_LIST_ITEMS: &str = "extract_list_items";
pub const EXTRACT_TABLE_DATA: &str = "extract_table_data";
pub const EXTRACT_ELEMENT_TEXT: &str = "extract_element_text";
pub const CLICK_ELEMENT_BY_INDEX: &str = "click_element_by_index";
pub const FILL_FIELD_BY_INDEX: &str = "fill_field_by_index";
pub const SCROLL: &str = "scroll";
pub const PRESS_ENTER: &str = "press_enter";
pub const CHECK_CHECKBOX: &str = "check_checkbox";
pub const HOVER_ELEMENT: &str = "hover_element";
pub const GET_CURRENT_URL: &str = "get_current_url";
pub const WAIT_FOR_NAVIGATION: &str = "wait_for_navigation";
pub const WAIT_FOR_ELEMENT: &str = "wait_for_element";
pub const SUB_AGENT_ANALYSIS: &str = "sub_agent_analysis";

pub const DEFAULT_MAX_COUNT: usize = 10;
pub const DEFAULT_SCROLL_AMOUNT: u32 = 500;
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// 动作说明：名称、调用示例、用途（用于生成 system prompt 中的工具菜单）
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub name: &'static str,
    pub example: &'static str,
    pub description: &'static str,
}

/// 工具菜单（顺序即 prompt 中的展示顺序）
pub const CATALOG: &[ActionSpec] = &[
    ActionSpec {
        name: NAVIGATE,
        example: r#"{"tool": "navigate", "args": {"url": "https://example.com"}}"#,
        description: "перейти по адресу (схема https:// добавляется автоматически)",
    },
    ActionSpec {
        name: EXTRACT_PAGE_SNAPSHOT,
        example: r#"{"tool": "extract_page_snapshot", "args": {}}"#,
        description: "снимок страницы: заголовок, URL и видимые элементы с индексами",
    },
    ActionSpec {
        name: EXTRACT_LIST_ITEMS,
        example: r#"{"tool": "extract_list_items", "args": {"max_count": 10}}"#,
        description: "извлечь элементы списка (письма, вакансии, товары)",
    },
    ActionSpec {
        name: EXTRACT_TABLE_DATA,
        example: r#"{"tool": "extract_table_data", "args": {"max_rows": 10}}"#,
        description: "извлечь строки таблицы",
    },
    ActionSpec {
        name: EXTRACT_ELEMENT_TEXT,
        example: r#"{"tool": "extract_element_text", "args": {"index": 0}}"#,
        description: "полный текст элемента по индексу",
    },
    ActionSpec {
        name: CLICK_ELEMENT_BY_INDEX,
        example: r#"{"tool": "click_element_by_index", "args": {"index": 0}}"#,
        description: "клик по элементу по индексу из снимка",
    },
    ActionSpec {
        name: FILL_FIELD_BY_INDEX,
        example: r#"{"tool": "fill_field_by_index", "args": {"index": 0, "value": "текст"}}"#,
        description: "ввести текст в поле по индексу",
    },
    ActionSpec {
        name: SCROLL,
        example: r#"{"tool": "scroll", "args": {"direction": "down", "amount": 500}}"#,
        description: "прокрутка страницы (up/down)",
    },
    ActionSpec {
        name: PRESS_ENTER,
        example: r#"{"tool": "press_enter", "args": {}}"#,
        description: "нажать Enter",
    },
    ActionSpec {
        name: CHECK_CHECKBOX,
        example: r#"{"tool": "check_checkbox", "args": {"index": 0}}"#,
        description: "отметить чекбокс по индексу",
    },
    ActionSpec {
        name: HOVER_ELEMENT,
        example: r#"{"tool": "hover_element", "args": {"index": 0}}"#,
        description: "навести курсор на элемент",
    },
    ActionSpec {
        name: GET_CURRENT_URL,
        example: r#"{"tool": "get_current_url", "args": {}}"#,
        description: "текущий URL",
    },
    ActionSpec {
        name: WAIT_FOR_NAVIGATION,
        example: r#"{"tool": "wait_for_navigation", "args": {}}"#,
        description: "дождаться загрузки страницы",
    },
    ActionSpec {
        name: WAIT_FOR_ELEMENT,
        example: r##"{"tool": "wait_for_element", "args": {"selector": "#search", "timeout": 10000}}"##,
        description: "дождаться появления элемента по CSS-селектору",
    },
    ActionSpec {
        name: SUB_AGENT_ANALYSIS,
        example: r#"{"tool": "sub_agent_analysis", "args": {"type": "spam", "items": ["текст письма"]}}"#,
        description: "анализ текстов: type=spam (спам) или type=jobs (вакансии, нужен user_profile)",
    },
];

/// 滚动方向（无法识别时按 Down 处理）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        }
    }
}

/// 已解析的动作
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserAction {
    Navigate { url: String },
    ExtractPageSnapshot,
    ExtractListItems { max_count: usize },
    ExtractTableData { max_rows: usize },
    ExtractElementText { index: usize },
    ClickElementByIndex { index: usize },
    FillFieldByIndex { index: usize, value: String },
    Scroll { direction: ScrollDirection, amount: u32 },
    PressEnter,
    CheckCheckbox { index: usize },
    HoverElement { index: usize },
    GetCurrentUrl,
    WaitForNavigation,
    WaitForElement { selector: String, timeout_ms: u64 },
    SubAgentAnalysis {
        kind: AnalysisKind,
        items: Vec<String>,
        user_profile: Option<String>,
    },
}

/// 无法映射到注册表的动作
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Неизвестный инструмент: {0}")]
    UnknownTool(String),

    #[error("Неизвестный тип анализа: {0}")]
    UnknownAnalysisType(String),
}

fn arg_usize(args: &Map<String, Value>, key: &str, default: usize) -> usize {
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v as usize)
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(|f| if f > 0.0 { f as usize } else { 0 }))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(|v| v.max(0) as usize).unwrap_or(default),
        _ => default,
    }
}

fn arg_string(args: &Map<String, Value>, key: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn arg_items(args: &Map<String, Value>) -> Vec<String> {
    match args.get("items") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

impl BrowserAction {
    /// 按名称解析动作并取参数
    pub fn from_descriptor(descriptor: &ActionDescriptor) -> Result<Self, ActionError> {
        let args = descriptor.arguments();
        let index = || arg_usize(args, "index", 0);
        let action = match descriptor.name() {
            NAVIGATE => BrowserAction::Navigate {
                url: arg_string(args, "url"),
            },
            EXTRACT_PAGE_SNAPSHOT => BrowserAction::ExtractPageSnapshot,
            EXTRACT_LIST_ITEMS => BrowserAction::ExtractListItems {
                max_count: arg_usize(args, "max_count", DEFAULT_MAX_COUNT),
            },
            EXTRACT_TABLE_DATA => BrowserAction::ExtractTableData {
                max_rows: arg_usize(args, "max_rows", DEFAULT_MAX_COUNT),
            },
            EXTRACT_ELEMENT_TEXT => BrowserAction::ExtractElementText { index: index() },
            CLICK_ELEMENT_BY_INDEX => BrowserAction::ClickElementByIndex { index: index() },
            FILL_FIELD_BY_INDEX => BrowserAction::FillFieldByIndex {
                index: index(),
                value: arg_string(args, "value"),
            },
            SCROLL => {
                let direction = match arg_string(args, "direction").to_lowercase().as_str() {
                    "up" | "вверх" => ScrollDirection::Up,
                    _ => ScrollDirection::Down,
                };
                let amount = arg_usize(args, "amount", DEFAULT_SCROLL_AMOUNT as usize);
                BrowserAction::Scroll {
                    direction,
                    amount: u32::try_from(amount).unwrap_or(u32::MAX),
                }
            }
            PRESS_ENTER => BrowserAction::PressEnter,
            CHECK_CHECKBOX => BrowserAction::CheckCheckbox { index: index() },
            HOVER_ELEMENT => BrowserAction::HoverElement { index: index() },
            GET_CURRENT_URL => BrowserAction::GetCurrentUrl,
            WAIT_FOR_NAVIGATION => BrowserAction::WaitForNavigation,
            WAIT_FOR_ELEMENT => BrowserAction::WaitForElement {
                selector: arg_string(args, "selector"),
                timeout_ms: arg_usize(args, "timeout", DEFAULT_WAIT_TIMEOUT_MS as usize) as u64,
            },
            SUB_AGENT_ANALYSIS => {
                let raw_type = arg_string(args, "type");
                let kind = if raw_type.is_empty() {
                    AnalysisKind::Spam
                } else {
                    AnalysisKind::parse(&raw_type)
                        .ok_or_else(|| ActionError::UnknownAnalysisType(raw_type.clone()))?
                };
                let user_profile = Some(arg_string(args, "user_profile")).filter(|p| !p.is_empty());
                BrowserAction::SubAgentAnalysis {
                    kind,
                    items: arg_items(args),
                    user_profile,
                }
            }
            other => return Err(ActionError::UnknownTool(other.to_string())),
        };
        Ok(action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BrowserAction::Navigate { .. } => NAVIGATE,
            BrowserAction::ExtractPageSnapshot => EXTRACT_PAGE_SNAPSHOT,
            BrowserAction::ExtractListItems { .. } => EXTRACT_LIST_ITEMS,
            BrowserAction::ExtractTableData { .. } => EXTRACT_TABLE_DATA,
            BrowserAction::ExtractElementText { .. } => EXTRACT_ELEMENT_TEXT,
            BrowserAction::ClickElementByIndex { .. } => CLICK_ELEMENT_BY_INDEX,
            BrowserAction::FillFieldByIndex { .. } => FILL_FIELD_BY_INDEX,
            BrowserAction::Scroll { .. } => SCROLL,
            BrowserAction::PressEnter => PRESS_ENTER,
            BrowserAction::CheckCheckbox { .. } => CHECK_CHECKBOX,
            BrowserAction::HoverElement { .. } => HOVER_ELEMENT,
            BrowserAction::GetCurrentUrl => GET_CURRENT_URL,
            BrowserAction::WaitForNavigation => WAIT_FOR_NAVIGATION,
            BrowserAction::WaitForElement { .. } => WAIT_FOR_ELEMENT,
            BrowserAction::SubAgentAnalysis { .. } => SUB_AGENT_ANALYSIS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(name: &str, args: Value) -> Result<BrowserAction, ActionError> {
        BrowserAction::from_descriptor(&ActionDescriptor::for_test(name, args))
    }

    #[test]
    fn test_catalog_names_resolve() {
        for spec in CATALOG {
            let action = resolve(spec.name, json!({})).unwrap();
            assert_eq!(action.name(), spec.name);
        }
    }

    #[test]
    fn test_catalog_examples_parse_to_their_action() {
        for spec in CATALOG {
            let descriptor = crate::react::parse_action(spec.example)
                .unwrap_or_else(|| panic!("example for {} does not parse", spec.name));
            assert_eq!(descriptor.name(), spec.name);
            assert_eq!(BrowserAction::from_descriptor(&descriptor).unwrap().name(), spec.name);
        }
        let wait = CATALOG.iter().find(|s| s.name == WAIT_FOR_ELEMENT).unwrap();
        assert!(wait.example.contains(r##""selector": "#search""##));
    }

    #[test]
    fn test_missing_and_malformed_args_degrade_to_defaults() {
        assert_eq!(
            resolve(CLICK_ELEMENT_BY_INDEX, json!({})).unwrap(),
            BrowserAction::ClickElementByIndex { index: 0 }
        );
        assert_eq!(
            resolve(CLICK_ELEMENT_BY_INDEX, json!({"index": "7"})).unwrap(),
            BrowserAction::ClickElementByIndex { index: 7 }
        );
        assert_eq!(
            resolve(CLICK_ELEMENT_BY_INDEX, json!({"index": -2})).unwrap(),
            BrowserAction::ClickElementByIndex { index: 0 }
        );
        assert_eq!(
            resolve(CLICK_ELEMENT_BY_INDEX, json!({"index": [1]})).unwrap(),
            BrowserAction::ClickElementByIndex { index: 0 }
        );
        assert_eq!(
            resolve(SCROLL, json!({"direction": "sideways", "amount": "abc"})).unwrap(),
            BrowserAction::Scroll { direction: ScrollDirection::Down, amount: 500 }
        );
        assert_eq!(
            resolve(SCROLL, json!({"direction": "UP", "amount": 120.7})).unwrap(),
            BrowserAction::Scroll { direction: ScrollDirection::Up, amount: 120 }
        );
        assert_eq!(
            resolve(FILL_FIELD_BY_INDEX, json!({"index": 1, "value": 12345})).unwrap(),
            BrowserAction::FillFieldByIndex { index: 1, value: "12345".to_string() }
        );
        assert_eq!(
            resolve(WAIT_FOR_ELEMENT, json!({"selector": "#q"})).unwrap(),
            BrowserAction::WaitForElement { selector: "#q".to_string(), timeout_ms: 10_000 }
        );
    }

    #[test]
    fn test_analysis_arguments() {
        assert_eq!(
            resolve(SUB_AGENT_ANALYSIS, json!({"items": ["a", 1]})).unwrap(),
            BrowserAction::SubAgentAnalysis {
                kind: AnalysisKind::Spam,
                items: vec!["a".to_string(), "1".to_string()],
                user_profile: None,
            }
        );
        assert_eq!(
            resolve(SUB_AGENT_ANALYSIS, json!({"type": "jobs", "items": "one", "user_profile": "Rust"})).unwrap(),
            BrowserAction::SubAgentAnalysis {
                kind: AnalysisKind::JobRelevance,
                items: vec!["one".to_string()],
                user_profile: Some("Rust".to_string()),
            }
        );
        assert_eq!(
            resolve(SUB_AGENT_ANALYSIS, json!({"type": "weather"})),
            Err(ActionError::UnknownAnalysisType("weather".to_string()))
        );
    }

    #[test]
    fn test_unknown_tool() {
        assert_eq!(
            resolve("open_terminal", json!({})),
            Err(ActionError::UnknownTool("open_terminal".to_string()))
        );
    }
}
