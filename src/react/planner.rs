//! Planner：system prompt 构建与模型调用
//!
//! system prompt = 行为约定（可由文件覆盖）+ 工具菜单（来自动作注册表）+ tool call 的 JSON Schema。

use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{LlmClient, LlmError};
use crate::memory::Conversation;
use crate::tools::{tool_call_schema_json, CATALOG};

/// 内置行为约定（未提供 prompt 文件时使用）
const DEFAULT_CONTRACT: &str = r#"Ты — автономный браузерный агент. Ты управляешь браузером через инструменты, выбирая РОВНО ОДНО действие за ход.

## 🔑 ГЛАВНОЕ ПРАВИЛО ДЛЯ ИНФОРМАЦИОННЫХ ЗАПРОСОВ:
Если пользователь просит найти информацию («найди», «поищи», «расскажи про»):
→ начинай с перехода на Яндекс: https://yandex.ru
→ используй поле поиска для ввода запроса
→ не пытайся угадать URL напрямую

## 🔴 КРИТИЧЕСКИ ВАЖНО — ФОРМАТ ОТВЕТА:
1. Ответ содержит ТОЛЬКО ОДИН чистый JSON без другого текста
2. Формат: {"tool": "название", "args": {"параметр": "значение"}}
3. ЗАПРЕЩЕНО: несколько инструментов в одном ответе, текст до или после JSON

## СТРАТЕГИЯ РАБОТЫ:
1. Перейди на нужную страницу (navigate)
2. Сделай снимок страницы (extract_page_snapshot), чтобы узнать индексы элементов
3. Взаимодействуй с элементами по индексам из последнего снимка
4. После каждого перехода снова делай снимок

## ФИНАЛЬНЫЙ ОТВЕТ:
Когда задача решена, напиши без JSON:
ЗАДАЧА ВЫПОЛНЕНА
Итог: краткое содержание результата"#;

/// 内置约定之外按顺序查找的 prompt 文件
const PROMPT_SEARCH_PATHS: &[&str] = &["config/prompts/system.md", "../config/prompts/system.md"];

/// 行为约定：显式路径必须可读；否则按默认路径查找，找不到用内置约定
pub fn load_contract(explicit: Option<&Path>) -> Result<String, AgentError> {
    if let Some(path) = explicit {
        return std::fs::read_to_string(path)
            .map_err(|e| AgentError::SystemPrompt(format!("{}: {}", path.display(), e)));
    }
    Ok(PROMPT_SEARCH_PATHS
        .iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .unwrap_or_else(|| DEFAULT_CONTRACT.to_string()))
}

/// 拼接完整 system prompt：约定 + 工具菜单 + Schema
pub fn build_system_prompt(contract: &str) -> String {
    let mut prompt = contract.trim_end().to_string();
    prompt.push_str("\n\n## ДОСТУПНЫЕ ИНСТРУМЕНТЫ:\n");
    for spec in CATALOG {
        let _ = writeln!(prompt, "{}  — {}", spec.example, spec.description);
    }
    let _ = write!(
        prompt,
        "\n## JSON SCHEMA ВЫЗОВА ИНСТРУМЕНТА:\n{}\n",
        tool_call_schema_json()
    );
    prompt
}

/// Planner：持有 LLM 与 system prompt；每轮把完整对话发给模型
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    /// 使用内置约定
    pub fn with_default_prompt(llm: Arc<dyn LlmClient>) -> Self {
        Self::new(llm, build_system_prompt(DEFAULT_CONTRACT))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 对话已包含 system 消息，原样发送
    pub async fn plan(&self, conversation: &Conversation) -> Result<String, LlmError> {
        self.llm.complete(conversation.messages()).await
    }
}
