//! 任务结果：四种终态及其面向用户的文本

use std::fmt;

use serde::Serialize;

use crate::llm::LlmError;

/// 从未离开过的空白页
pub const BLANK_URL: &str = "about:blank";

/// 展示最后一次回复时的最大字符数
const REPLY_PREVIEW_CHARS: usize = 300;

/// 一次任务的终态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// 模型宣告完成；summary 为提取出的最终段落
    Done { summary: String, turns: usize },
    /// 连续格式错误达到上限
    FormatFailure {
        last_reply: String,
        attempts: usize,
        turns: usize,
    },
    /// 轮数用尽；last_url 为 None 表示一直停留在空白页
    BudgetExhausted {
        max_turns: usize,
        last_url: Option<String>,
    },
    /// 模型调用失败（不重试）
    TransportFailure {
        #[serde(serialize_with = "serialize_error")]
        error: LlmError,
        turns: usize,
    },
}

fn serialize_error<S: serde::Serializer>(error: &LlmError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&error.to_string())
}

impl TaskOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done { .. })
    }

    /// 结束时已消耗的模型调用轮数
    pub fn turns(&self) -> usize {
        match self {
            TaskOutcome::Done { turns, .. }
            | TaskOutcome::FormatFailure { turns, .. }
            | TaskOutcome::TransportFailure { turns, .. } => *turns,
            TaskOutcome::BudgetExhausted { max_turns, .. } => *max_turns,
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Done { summary, .. } => write!(f, "✅ ЗАДАЧА ВЫПОЛНЕНА:\n{}", summary),
            TaskOutcome::FormatFailure {
                last_reply,
                attempts,
                ..
            } => {
                let preview: String = last_reply.chars().take(REPLY_PREVIEW_CHARS).collect();
                write!(
                    f,
                    "⚠️ ОШИБКА ФОРМАТА: модель {} раз подряд ответила без корректного вызова инструмента.\nПоследний ответ:\n{}",
                    attempts, preview
                )
            }
            TaskOutcome::BudgetExhausted { max_turns, last_url } => {
                write!(f, "⚠️ ЛИМИТ ШАГОВ: Достигнут лимит шагов ({}).\n", max_turns)?;
                match last_url {
                    Some(url) => write!(
                        f,
                        "Последний URL: {}\nАгент не завершил задачу, но выполнил часть действий.",
                        url
                    ),
                    None => write!(f, "Агент не смог покинуть пустую страницу"),
                }
            }
            TaskOutcome::TransportFailure { error, .. } => {
                write!(f, "❌ ОШИБКА СВЯЗИ С LLM: {}", error)
            }
        }
    }
}
