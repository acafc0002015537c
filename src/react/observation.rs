//! 观察渲染：把 ToolOutcome 转成写回对话的文本，以及最终答案提取

use std::fmt::Write;

use serde_json::Value;

use crate::tools::action::{EXTRACT_PAGE_SNAPSHOT, SUB_AGENT_ANALYSIS};
use crate::tools::ToolOutcome;

/// 快照中展示给模型的元素上限
pub const SNAPSHOT_ELEMENT_LIMIT: usize = 15;
/// 每个元素文本的最大字符数
const ELEMENT_TEXT_CHARS: usize = 60;
/// 单段长文本（extract_element_text 等）写回对话时的最大字符数
const TEXT_PAYLOAD_CHARS: usize = 2000;

/// 写回对话的观察前缀
pub const OBSERVATION_PREFIX: &str = "Результат действия:\n";

fn element_line(el: &Value) -> Option<String> {
    let obj = el.as_object()?;
    let index = match obj.get("index") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "?".to_string(),
    };
    let kind = obj.get("type").and_then(Value::as_str).unwrap_or("?");
    let text: String = obj
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .chars()
        .take(ELEMENT_TEXT_CHARS)
        .collect();
    Some(format!("{}. [{}] \"{}\"", index, kind, text.trim()))
}

/// 把动作结果渲染为给模型看的文本（不含前缀）
pub fn render_outcome(action_name: &str, outcome: &ToolOutcome) -> String {
    let mut out = if outcome.success {
        format!(
            "✅ Успешно: {}",
            outcome.message.as_deref().unwrap_or("Действие выполнено")
        )
    } else {
        let reason = outcome
            .error
            .as_deref()
            .or(outcome.message.as_deref())
            .unwrap_or("Неизвестная ошибка");
        format!("❌ Ошибка: {}", reason)
    };

    if !outcome.success {
        return out;
    }

    if action_name == EXTRACT_PAGE_SNAPSHOT {
        let count = outcome.element_count();
        let lines: Vec<String> = outcome
            .elements()
            .iter()
            .take(SNAPSHOT_ELEMENT_LIMIT)
            .filter_map(element_line)
            .collect();
        let _ = write!(
            out,
            "\n\nТекущая страница: {}\nURL: {}\n\nЭлементы на странице ({}):\n{}",
            outcome.get_str("title").unwrap_or("Без названия"),
            outcome.url().unwrap_or("Неизвестен"),
            count,
            if lines.is_empty() {
                "Нет элементов".to_string()
            } else {
                lines.join("\n")
            }
        );
        if count > SNAPSHOT_ELEMENT_LIMIT {
            let _ = write!(out, "\n... и ещё {} элементов", count - SNAPSHOT_ELEMENT_LIMIT);
        }
        return out;
    }

    // 列表、分析等带格式化条目的结果
    if let Some(items) = outcome.get("formatted_items").and_then(Value::as_array) {
        for item in items {
            match item {
                Value::String(s) => {
                    let _ = write!(out, "\n{}", s);
                }
                other => {
                    let _ = write!(out, "\n{}", other);
                }
            }
        }
    } else if let Some(items) = outcome.get("items").and_then(Value::as_array) {
        for (i, item) in items.iter().enumerate() {
            let text = item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string());
            let _ = write!(out, "\n{}. {}", i, text);
        }
    }
    if let Some(text) = outcome.get_str("text") {
        let text: String = text.chars().take(TEXT_PAYLOAD_CHARS).collect();
        let _ = write!(out, "\n{}", text);
    }
    if action_name == SUB_AGENT_ANALYSIS {
        if let Some(summary) = outcome.get("summary") {
            let _ = write!(out, "\nСводка: {}", summary);
        }
    }
    out
}

/// 回复中是否出现完成短语（大小写不敏感）
pub fn mentions_completion(reply: &str, phrases: &[String]) -> bool {
    let lower = reply.to_lowercase();
    phrases
        .iter()
        .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
}

/// 提取最终段落：从第一个（按配置顺序）出现的总结关键词开始，否则整段回复
///
/// 在小写副本上搜索，再按字符序号映射回原文，保证切片落在字符边界上。
pub fn final_section<'a>(reply: &'a str, keywords: &[String]) -> &'a str {
    let lower: Vec<char> = reply.chars().flat_map(char::to_lowercase).collect();
    let original: Vec<(usize, char)> = reply.char_indices().collect();
    // to_lowercase 可能改变字符数，此时按字符序号对应不可靠，退回整段
    if lower.len() != original.len() {
        return reply;
    }
    for keyword in keywords {
        let needle: Vec<char> = keyword.chars().flat_map(char::to_lowercase).collect();
        if needle.is_empty() || needle.len() > lower.len() {
            continue;
        }
        if let Some(pos) = lower.windows(needle.len()).position(|w| w == needle.as_slice()) {
            return &reply[original[pos].0..];
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keywords() -> Vec<String> {
        ["итог", "результат", "ответ", "вывод", "отчёт"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_render_success_and_failure() {
        assert_eq!(
            render_outcome("press_enter", &ToolOutcome::ok("Enter нажат")),
            "✅ Успешно: Enter нажат"
        );
        assert_eq!(
            render_outcome("navigate", &ToolOutcome::failure("timeout")),
            "❌ Ошибка: timeout"
        );
        assert_eq!(
            render_outcome("delete", &ToolOutcome::skipped("Действие отменено пользователем")),
            "❌ Ошибка: Действие отменено пользователем"
        );
    }

    #[test]
    fn test_snapshot_lists_first_fifteen_elements() {
        let elements: Vec<Value> = (0..20)
            .map(|i| json!({"index": i, "type": "link", "text": format!("  ссылка {i}  ")}))
            .collect();
        let outcome = ToolOutcome::ok("Снимок получен")
            .with("title", "Почта")
            .with("url", "https://mail.example.com")
            .with("element_count", 20)
            .with("elements", elements);
        let text = render_outcome(EXTRACT_PAGE_SNAPSHOT, &outcome);
        assert!(text.contains("Текущая страница: Почта"));
        assert!(text.contains("URL: https://mail.example.com"));
        assert!(text.contains("Элементы на странице (20):"));
        assert!(text.contains("14. [link] \"ссылка 14\""));
        assert!(!text.contains("15. [link]"));
        assert!(text.ends_with("... и ещё 5 элементов"));
    }

    #[test]
    fn test_snapshot_element_text_truncated() {
        let outcome = ToolOutcome::ok("ok")
            .with("url", "https://a.b")
            .with("elements", json!([{"index": 0, "type": "button", "text": "ж".repeat(80)}]));
        let text = render_outcome(EXTRACT_PAGE_SNAPSHOT, &outcome);
        assert!(text.contains(&format!("0. [button] \"{}\"", "ж".repeat(60))));
        assert!(text.contains("Элементы на странице (1):"));
    }

    #[test]
    fn test_formatted_items_and_text_appended() {
        let outcome = ToolOutcome::ok("Найдено 2")
            .with("formatted_items", json!(["[0] письмо", "[1] счёт"]));
        assert_eq!(
            render_outcome("extract_list_items", &outcome),
            "✅ Успешно: Найдено 2\n[0] письмо\n[1] счёт"
        );
        let outcome = ToolOutcome::ok("Текст получен").with("text", "Полный текст");
        assert!(render_outcome("extract_element_text", &outcome).ends_with("\nПолный текст"));
    }

    #[test]
    fn test_final_section_from_first_keyword() {
        let reply = "Задача выполнена. ИТОГ: найдено 3 письма со спамом.";
        assert_eq!(final_section(reply, &keywords()), "ИТОГ: найдено 3 письма со спамом.");
        assert_eq!(final_section("Готово!", &keywords()), "Готово!");
        // порядок ключевых слов важнее позиции в тексте
        let reply = "Ответ ниже. Итог: 42";
        assert_eq!(final_section(reply, &keywords()), "Итог: 42");
    }

    #[test]
    fn test_completion_phrase_case_insensitive() {
        let phrases = vec!["задача выполнена".to_string()];
        assert!(mentions_completion("ЗАДАЧА ВЫПОЛНЕНА\nвсё", &phrases));
        assert!(!mentions_completion("продолжаю", &phrases));
    }
}
