//! 任务主循环集成测试：MockLlmClient + 内存中的浏览器 stub，走完整的 BrowserAgent 流程

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use browser_pilot::analysis::AnalysisKind;
use browser_pilot::guard::AutoConfirm;
use browser_pilot::llm::{LlmClient, LlmError, MockLlmClient};
use browser_pilot::memory::Role;
use browser_pilot::react::TaskEvent;
use browser_pilot::tools::{BrowserCapability, CapabilityResult, ToolOutcome};
use browser_pilot::{AppConfig, BrowserAgent, TaskOutcome};

const NAVIGATE: &str = r#"{"tool": "navigate", "args": {"url": "https://example.com"}}"#;
const SNAPSHOT: &str = r#"{"tool": "extract_page_snapshot", "args": {}}"#;
const CURRENT_URL: &str = r#"{"tool": "get_current_url", "args": {}}"#;
const FINAL: &str = "Задача выполнена.\nИтог: на странице 5 ссылок.";

/// 浏览器 stub：记录导航与点击；blank=true 时快照返回空白页
#[derive(Default)]
struct StubBrowser {
    blank: bool,
    navigations: Mutex<Vec<String>>,
    clicks: Mutex<Vec<usize>>,
}

impl StubBrowser {
    fn blank() -> Self {
        Self {
            blank: true,
            ..Self::default()
        }
    }

    fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserCapability for StubBrowser {
    async fn navigate(&self, url: &str) -> CapabilityResult {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(ToolOutcome::ok(format!("Перешли на {url}")).with("url", url))
    }

    async fn extract_page_snapshot(&self) -> CapabilityResult {
        if self.blank {
            return Ok(ToolOutcome::ok("Извлечено 0 элементов со страницы")
                .with("url", "about:blank")
                .with("title", "")
                .with("element_count", 0)
                .with("elements", Vec::<serde_json::Value>::new()));
        }
        let elements: Vec<_> = (0..5)
            .map(|i| json!({"index": i, "type": "a", "text": format!("Ссылка {i}")}))
            .collect();
        Ok(ToolOutcome::ok("Извлечено 5 элементов со страницы")
            .with("url", "https://example.com/inbox")
            .with("title", "Входящие")
            .with("element_count", 5)
            .with("elements", elements))
    }

    async fn click_element_by_index(&self, index: usize) -> CapabilityResult {
        self.clicks.lock().unwrap().push(index);
        Ok(ToolOutcome::ok(format!("Кликнули по элементу #{index}")))
    }

    async fn fill_field_by_index(&self, index: usize, _value: &str) -> CapabilityResult {
        Ok(ToolOutcome::ok(format!("Заполнили поле #{index}")))
    }

    async fn get_current_url(&self) -> CapabilityResult {
        Ok(ToolOutcome::ok("Текущий URL: https://example.com/inbox").with("url", "https://example.com/inbox"))
    }
}

fn agent_with(
    cfg: &AppConfig,
    llm: Arc<MockLlmClient>,
    browser: Arc<StubBrowser>,
    approve: bool,
) -> BrowserAgent {
    let llm: Arc<dyn LlmClient> = llm;
    BrowserAgent::from_config(cfg, llm, browser, Box::new(AutoConfirm(approve))).unwrap()
}

#[tokio::test]
async fn test_task_completes_with_final_section() {
    let llm = Arc::new(MockLlmClient::scripted([NAVIGATE, SNAPSHOT, CURRENT_URL, FINAL]));
    let browser = Arc::new(StubBrowser::default());
    let agent = agent_with(&AppConfig::default(), llm.clone(), browser.clone(), true);

    let outcome = agent.run_task("посчитай ссылки на example.com").await;
    match &outcome {
        TaskOutcome::Done { summary, turns } => {
            assert_eq!(summary, "Итог: на странице 5 ссылок.");
            assert_eq!(*turns, 4);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(outcome.to_string().starts_with("✅ ЗАДАЧА ВЫПОЛНЕНА"));
    assert_eq!(llm.call_count(), 4);
    assert_eq!(browser.navigations(), vec!["https://example.com"]);

    // 快照观察以 user 消息回到模型
    let third = &llm.requests()[2];
    let observation = &third.last().unwrap();
    assert_eq!(observation.role, Role::User);
    assert!(observation.content.starts_with("Результат действия:\n"));
    assert!(observation.content.contains("Элементы на странице (5):"));
}

#[tokio::test]
async fn test_three_replies_without_tool_call_end_task() {
    let llm = Arc::new(MockLlmClient::scripted(["думаю", "ещё думаю", "всё ещё думаю", NAVIGATE]));
    let agent = agent_with(&AppConfig::default(), llm.clone(), Arc::new(StubBrowser::default()), true);

    let outcome = agent.run_task("открой сайт").await;
    match &outcome {
        TaskOutcome::FormatFailure { attempts, last_reply, .. } => {
            assert_eq!(*attempts, 3);
            assert_eq!(last_reply, "всё ещё думаю");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(llm.call_count(), 3);
    assert!(outcome.to_string().starts_with("⚠️ ОШИБКА ФОРМАТА"));
}

#[tokio::test]
async fn test_blank_pages_trigger_anchor_navigation() {
    let llm = Arc::new(MockLlmClient::scripted([SNAPSHOT, SNAPSHOT, SNAPSHOT, FINAL]));
    let browser = Arc::new(StubBrowser::blank());
    let agent = agent_with(&AppConfig::default(), llm.clone(), browser.clone(), true);

    let outcome = agent.run_task("найди погоду").await;
    assert!(outcome.is_done());
    assert_eq!(browser.navigations(), vec!["https://yandex.ru"]);

    let fourth = &llm.requests()[3];
    let note = fourth.last().unwrap();
    assert_eq!(note.role, Role::System);
    assert!(note.content.contains("https://yandex.ru"));
}

#[tokio::test]
async fn test_transport_error_is_fatal() {
    let llm = Arc::new(MockLlmClient::with_results([
        Ok(NAVIGATE.to_string()),
        Err(LlmError::ApiError("connection reset".to_string())),
        Ok(FINAL.to_string()),
    ]));
    let agent = agent_with(&AppConfig::default(), llm.clone(), Arc::new(StubBrowser::default()), true);

    let outcome = agent.run_task("открой сайт").await;
    assert!(matches!(outcome, TaskOutcome::TransportFailure { turns: 2, .. }));
    assert!(outcome.to_string().starts_with("❌ ОШИБКА СВЯЗИ С LLM"));
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_declined_action_is_not_dispatched() {
    let click = r#"{"tool": "click_element_by_index", "args": {"index": 3, "label": "Удалить письмо"}}"#;
    let llm = Arc::new(MockLlmClient::scripted([click, FINAL]));
    let browser = Arc::new(StubBrowser::default());
    let agent = agent_with(&AppConfig::default(), llm.clone(), browser.clone(), false);

    let outcome = agent.run_task("проверь почту").await;
    assert!(outcome.is_done());
    assert!(browser.clicks.lock().unwrap().is_empty());

    let second = &llm.requests()[1];
    assert!(second.last().unwrap().content.contains("Действие отменено пользователем"));
}

#[tokio::test]
async fn test_authorized_task_skips_confirmation() {
    let click = r#"{"tool": "click_element_by_index", "args": {"index": 3, "label": "Удалить"}}"#;
    let llm = Arc::new(MockLlmClient::scripted([click, FINAL]));
    let browser = Arc::new(StubBrowser::default());
    // 拒绝所有确认：若触发确认，点击不会执行
    let agent = agent_with(&AppConfig::default(), llm, browser.clone(), false);

    let outcome = agent.run_task("удалить спам из почты").await;
    assert!(outcome.is_done());
    assert_eq!(*browser.clicks.lock().unwrap(), vec![3]);
}

#[tokio::test]
async fn test_budget_exhausted_reports_last_url() {
    let mut cfg = AppConfig::default();
    cfg.agent.max_turns = 2;
    let llm = Arc::new(MockLlmClient::scripted([SNAPSHOT, SNAPSHOT, SNAPSHOT]));
    let agent = agent_with(&cfg, llm.clone(), Arc::new(StubBrowser::default()), true);

    let outcome = agent.run_task("листай бесконечно").await;
    assert_eq!(
        outcome,
        TaskOutcome::BudgetExhausted {
            max_turns: 2,
            last_url: Some("https://example.com/inbox".to_string()),
        }
    );
    assert_eq!(llm.call_count(), 2);
    assert!(outcome.to_string().contains("Последний URL: https://example.com/inbox"));
}

#[tokio::test]
async fn test_analysis_action_runs_and_is_cached() {
    let analysis = r#"{"tool": "sub_agent_analysis", "args": {"type": "spam", "items": ["Вы выиграли миллион!", "Счёт за май"]}}"#;
    let verdicts = r#"{"analysis": [{"index": 0, "is_spam": true, "reason": "лотерея"}, {"index": 1, "is_spam": false, "reason": "счёт"}]}"#;
    let llm = Arc::new(MockLlmClient::scripted([analysis, verdicts, FINAL]));
    // 拒绝所有确认：分析是只读动作，不应进入确认
    let agent = agent_with(&AppConfig::default(), llm.clone(), Arc::new(StubBrowser::default()), false);

    let outcome = agent.run_task("найди спам во входящих").await;
    assert!(outcome.is_done());
    assert_eq!(llm.call_count(), 3);

    let report = agent.last_analysis(AnalysisKind::Spam).unwrap();
    assert_eq!(report.total(), 2);
    assert!(agent.last_analysis(AnalysisKind::JobRelevance).is_none());
}

#[tokio::test]
async fn test_events_follow_the_loop() {
    let llm = Arc::new(MockLlmClient::scripted([NAVIGATE, "не знаю", FINAL]));
    let agent = agent_with(&AppConfig::default(), llm, Arc::new(StubBrowser::default()), true);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let outcome = agent.run_task_with_events("открой сайт", &tx).await;
    assert!(outcome.is_done());

    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    assert!(matches!(events.first(), Some(TaskEvent::TurnStarted { turn: 1, max_turns: 30 })));
    assert!(events
        .iter()
        .any(|e| matches!(e, TaskEvent::ToolCall { tool, .. } if tool == "navigate")));
    assert!(events
        .iter()
        .any(|e| matches!(e, TaskEvent::Observation { success: true, .. })));
    let format_errors: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, TaskEvent::FormatError { .. }))
        .collect();
    assert_eq!(format_errors.len(), 1);
    assert!(matches!(events.last(), Some(TaskEvent::Finished { .. })));
}
