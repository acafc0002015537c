//! 危险动作判定
//!
//! 动作名 + 参数文本中出现敏感词即视为危险；若任务描述本身明确要求这一类操作（删除垃圾邮件、
//! 下单、投递简历），则视为用户已预先授权，不再确认。授权意图清单是封闭的，不做隐式信任。

use serde_json::{Map, Value};

use crate::tools::action::SUB_AGENT_ANALYSIS;

/// 敏感词（小写匹配）
const SENSITIVE_TERMS: &[&str] = &[
    "удалить",
    "спам",
    "корзина",
    "очистить",
    "оплатить",
    "купить",
    "заказать",
    "подтвердить",
    "отправить",
    "откликнуться",
    "сохранить",
    "delete",
    "spam",
    "trash",
    "empty",
    "pay",
    "buy",
    "order",
    "confirm",
    "send",
    "apply",
    "respond",
    "save",
];

/// 任务描述可显式授权的三类操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOverride {
    DeleteSpam,
    PlaceOrder,
    RespondToJobs,
}

impl IntentOverride {
    pub const ALL: [IntentOverride; 3] = [
        IntentOverride::DeleteSpam,
        IntentOverride::PlaceOrder,
        IntentOverride::RespondToJobs,
    ];

    /// 任务描述中表示该意图的短语
    fn task_phrases(self) -> &'static [&'static str] {
        match self {
            IntentOverride::DeleteSpam => &["удалить спам", "очистить спам", "delete spam", "clear spam"],
            IntentOverride::PlaceOrder => &["закажи", "заказать", "place an order"],
            IntentOverride::RespondToJobs => &[
                "откликнись",
                "откликнуться",
                "respond to job",
            ],
        }
    }

    /// 动作文本中属于该类操作的标记
    fn action_markers(self) -> &'static [&'static str] {
        match self {
            IntentOverride::DeleteSpam => &["удалить", "корзина", "delete", "trash"],
            IntentOverride::PlaceOrder => &["заказать", "купить", "order", "buy"],
            IntentOverride::RespondToJobs => &["отклик", "отправить", "respond", "apply", "send"],
        }
    }

    /// 任务授权了该意图，且动作正属于这一类
    fn authorizes(self, task_lower: &str, action_lower: &str) -> bool {
        self.task_phrases().iter().any(|p| task_lower.contains(p))
            && self.action_markers().iter().any(|m| action_lower.contains(m))
    }
}

/// 危险动作判定器（无状态）
#[derive(Debug, Default, Clone, Copy)]
pub struct DangerGate;

impl DangerGate {
    pub fn new() -> Self {
        Self
    }

    /// 动作是否需要用户确认
    pub fn is_dangerous(&self, action_name: &str, arguments: &Map<String, Value>, task: &str) -> bool {
        // 分析只读页面文本，不改变页面
        if action_name == SUB_AGENT_ANALYSIS {
            return false;
        }

        let action_text = format!("{} {}", action_name, Value::Object(arguments.clone())).to_lowercase();

        if !SENSITIVE_TERMS.iter().any(|t| action_text.contains(t)) {
            return false;
        }

        let task_lower = task.to_lowercase();
        let authorized = IntentOverride::ALL
            .iter()
            .find(|intent| intent.authorizes(&task_lower, &action_text));
        if let Some(intent) = authorized {
            tracing::debug!(action = %action_name, intent = ?intent, "sensitive action pre-authorized by task");
            return false;
        }
        true
    }
}
