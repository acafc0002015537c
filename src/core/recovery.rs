//! 卡住恢复引擎
//!
//! 根据计数器返回 RecoveryAction：格式错误 → 纠正提示或终止；连续空白页 → 导航到锚点。

use crate::config::AgentSection;
use crate::core::RecoveryAction;

/// 模型输出格式不对时追加的纠正提示
pub const FORMAT_CORRECTION: &str = "ОШИБКА ФОРМАТА! Ответ должен содержать ТОЛЬКО ОДИН инструмент в ЧИСТОМ JSON:\n{\"tool\": \"название_инструмента\", \"args\": {\"параметр\": \"значение\"}}\nБез текста до/после JSON, без нескольких инструментов в одном ответе.";

/// 熔断阈值：连续格式错误与连续空白页
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_format_errors: usize,
    blank_page_threshold: usize,
    anchor_url: String,
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::from_config(&AgentSection::default())
    }
}

impl RecoveryEngine {
    pub fn new(max_format_errors: usize, blank_page_threshold: usize, anchor_url: impl Into<String>) -> Self {
        Self {
            max_format_errors,
            blank_page_threshold,
            anchor_url: anchor_url.into(),
        }
    }

    pub fn from_config(section: &AgentSection) -> Self {
        Self::new(
            section.max_format_errors,
            section.blank_page_threshold,
            section.anchor_url.clone(),
        )
    }

    /// 连续第 errors 次格式错误
    pub fn on_format_error(&self, errors: usize) -> RecoveryAction {
        if errors >= self.max_format_errors {
            RecoveryAction::Abort
        } else {
            RecoveryAction::RetryWithPrompt(FORMAT_CORRECTION.to_string())
        }
    }

    /// 连续空白页计数；未达阈值返回 None
    pub fn on_blank_pages(&self, blanks: usize) -> Option<RecoveryAction> {
        (blanks >= self.blank_page_threshold)
            .then(|| RecoveryAction::NavigateToAnchor(self.anchor_url.clone()))
    }

    /// 恢复导航结果，作为 System 消息写回对话
    pub fn recovery_note(&self, succeeded: bool) -> String {
        if succeeded {
            format!(
                "Восстановление: агент застрял на пустой странице, выполнен переход на {} (успешно). Продолжай задачу с этой страницы.",
                self.anchor_url
            )
        } else {
            format!(
                "Восстановление: агент застрял на пустой странице, переход на {} не удался.",
                self.anchor_url
            )
        }
    }
}
