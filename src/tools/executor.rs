//! 工具执行器
//!
//! 持有浏览器能力、分析器与全局超时。dispatch(action) 在一处完成名称解析与分派，
//! 任何失败（未知工具、能力层报错、超时、分析失败）都转为 success=false 的 ToolOutcome，
//! 不会向任务循环抛错；每次调用输出结构化审计日志（JSON）。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::analysis::{AnalysisKind, AnalysisReport, AnalysisRequest, Analyzer};
use crate::react::ActionDescriptor;
use crate::tools::{BrowserAction, BrowserCapability, CapabilityResult, ToolOutcome};

/// 工具执行器：浏览器动作施加超时，分析动作交给 Analyzer
pub struct ToolExecutor {
    capability: Arc<dyn BrowserCapability>,
    analyzer: Option<Analyzer>,
    timeout: Duration,
    last_reports: Mutex<HashMap<AnalysisKind, AnalysisReport>>,
}

impl ToolExecutor {
    pub fn new(capability: Arc<dyn BrowserCapability>, timeout_secs: u64) -> Self {
        Self {
            capability,
            analyzer: None,
            timeout: Duration::from_secs(timeout_secs),
            last_reports: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// 执行一个动作；结果总是 ToolOutcome
    pub async fn dispatch(&self, descriptor: &ActionDescriptor) -> ToolOutcome {
        let start = Instant::now();
        let (outcome, status) = match BrowserAction::from_descriptor(descriptor) {
            Ok(action) => self.run(action).await,
            Err(e) => (ToolOutcome::failure(e.to_string()), "unknown"),
        };

        audit(descriptor.name(), &descriptor.arguments_text(), &outcome, status, start);
        outcome
    }

    /// 绕过模型直接执行已解析的动作（恢复导航等）
    pub async fn execute(&self, action: BrowserAction) -> ToolOutcome {
        let start = Instant::now();
        let name = action.name();
        let (outcome, status) = self.run(action).await;
        audit(name, "", &outcome, status, start);
        outcome
    }

    /// 某类分析最近一次成功的报告
    pub fn last_analysis(&self, kind: AnalysisKind) -> Option<AnalysisReport> {
        self.last_reports
            .lock()
            .ok()
            .and_then(|reports| reports.get(&kind).cloned())
    }

    async fn run(&self, action: BrowserAction) -> (ToolOutcome, &'static str) {
        if let BrowserAction::SubAgentAnalysis { kind, items, user_profile } = action {
            return self.analyze(kind, items, user_profile).await;
        }

        let action = self.bound_wait(action);
        let name = action.name();
        match timeout(self.timeout, self.call_capability(action)).await {
            Ok(Ok(outcome)) => {
                let status = if outcome.success { "ok" } else { "error" };
                (outcome, status)
            }
            Ok(Err(e)) => (ToolOutcome::failure(e), "error"),
            Err(_) => (
                ToolOutcome::failure(format!(
                    "Превышено время ожидания ({} с) для {}",
                    self.timeout.as_secs(),
                    name
                )),
                "timeout",
            ),
        }
    }

    /// 页面等待需在工具超时之前自行结束（取工具超时的 4/5）
    fn bound_wait(&self, action: BrowserAction) -> BrowserAction {
        match action {
            BrowserAction::WaitForElement { selector, timeout_ms } => {
                let limit = (self.timeout.as_millis() as u64).saturating_mul(4) / 5;
                if timeout_ms > limit {
                    tracing::debug!(requested = timeout_ms, limit, "wait_for_element timeout clamped");
                }
                BrowserAction::WaitForElement {
                    selector,
                    timeout_ms: timeout_ms.min(limit),
                }
            }
            other => other,
        }
    }

    async fn call_capability(&self, action: BrowserAction) -> CapabilityResult {
        let browser = &self.capability;
        match action {
            BrowserAction::Navigate { url } => browser.navigate(&url).await,
            BrowserAction::ExtractPageSnapshot => browser.extract_page_snapshot().await,
            BrowserAction::ExtractListItems { max_count } => browser.extract_list_items(max_count).await,
            BrowserAction::ExtractTableData { max_rows } => browser.extract_table_data(max_rows).await,
            BrowserAction::ExtractElementText { index } => browser.extract_element_text(index).await,
            BrowserAction::ClickElementByIndex { index } => browser.click_element_by_index(index).await,
            BrowserAction::FillFieldByIndex { index, value } => {
                browser.fill_field_by_index(index, &value).await
            }
            BrowserAction::Scroll { direction, amount } => browser.scroll(direction, amount).await,
            BrowserAction::PressEnter => browser.press_enter().await,
            BrowserAction::CheckCheckbox { index } => browser.check_checkbox(index).await,
            BrowserAction::HoverElement { index } => browser.hover_element(index).await,
            BrowserAction::GetCurrentUrl => browser.get_current_url().await,
            BrowserAction::WaitForNavigation => browser.wait_for_navigation().await,
            BrowserAction::WaitForElement { selector, timeout_ms } => {
                browser.wait_for_element(&selector, timeout_ms).await
            }
            BrowserAction::SubAgentAnalysis { .. } => {
                Err("Анализ не выполняется браузером".to_string())
            }
        }
    }

    async fn analyze(
        &self,
        kind: AnalysisKind,
        items: Vec<String>,
        context: Option<String>,
    ) -> (ToolOutcome, &'static str) {
        let Some(analyzer) = &self.analyzer else {
            return (ToolOutcome::failure("Анализ недоступен: модель не настроена"), "error");
        };
        let request = AnalysisRequest { kind, items, context };
        match analyzer.analyze(&request).await {
            Ok(report) => {
                let outcome = report.to_outcome();
                if let Ok(mut reports) = self.last_reports.lock() {
                    reports.insert(kind, report);
                }
                (outcome, "ok")
            }
            Err(e) => {
                tracing::warn!(error = %e, "analysis failed");
                (e.to_outcome(), "error")
            }
        }
    }
}

fn audit(tool: &str, args: &str, outcome: &ToolOutcome, status: &str, start: Instant) {
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": tool,
        "ok": outcome.success,
        "outcome": status,
        "duration_ms": start.elapsed().as_millis() as u64,
        "args_preview": args_preview(args),
    });
    tracing::info!(audit = %audit.to_string(), "tool");
}

fn args_preview(text: &str) -> String {
    if text.chars().count() > 200 {
        format!("{}...", text.chars().take(200).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::tools::BlockingLane;

    use crate::llm::MockLlmClient;

    struct FakeBrowser;

    #[async_trait]
    impl BrowserCapability for FakeBrowser {
        async fn navigate(&self, url: &str) -> CapabilityResult {
            Ok(ToolOutcome::ok("ok").with("url", url))
        }

        async fn extract_page_snapshot(&self) -> CapabilityResult {
            Err("tab crashed".to_string())
        }

        async fn click_element_by_index(&self, _index: usize) -> CapabilityResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ToolOutcome::ok("clicked"))
        }

        async fn fill_field_by_index(&self, index: usize, value: &str) -> CapabilityResult {
            Ok(ToolOutcome::ok(format!("{index}={value}")))
        }
    }

    /// 所有操作经 BlockingLane 在阻塞线程执行，并统计同时在跑的操作数
    #[derive(Default)]
    struct LaneBrowser {
        lane: BlockingLane,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        waits: Mutex<Vec<u64>>,
    }

    impl LaneBrowser {
        async fn blocking(&self, hold: Duration, outcome: ToolOutcome) -> CapabilityResult {
            let in_flight = Arc::clone(&self.in_flight);
            let peak = Arc::clone(&self.peak);
            self.lane
                .run(move || {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(hold);
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(outcome)
                })
                .await
        }
    }

    #[async_trait]
    impl BrowserCapability for LaneBrowser {
        async fn navigate(&self, url: &str) -> CapabilityResult {
            self.blocking(Duration::from_millis(10), ToolOutcome::ok("ok").with("url", url))
                .await
        }

        async fn extract_page_snapshot(&self) -> CapabilityResult {
            self.blocking(Duration::from_millis(10), ToolOutcome::ok("snapshot")).await
        }

        async fn click_element_by_index(&self, _index: usize) -> CapabilityResult {
            self.blocking(Duration::from_millis(10), ToolOutcome::ok("clicked")).await
        }

        async fn fill_field_by_index(&self, _index: usize, _value: &str) -> CapabilityResult {
            self.blocking(Duration::from_millis(10), ToolOutcome::ok("filled")).await
        }

        async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> CapabilityResult {
            self.waits.lock().unwrap().push(timeout_ms);
            // 页面卡住：阻塞时间超过执行器超时
            self.blocking(Duration::from_millis(1500), ToolOutcome::ok(selector.to_string()))
                .await
        }
    }

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Arc::new(FakeBrowser), 1)
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_capability() {
        let out = executor()
            .dispatch(&ActionDescriptor::for_test("navigate", json!({"url": "https://ya.ru"})))
            .await;
        assert!(out.success);
        assert_eq!(out.url(), Some("https://ya.ru"));

        let out = executor()
            .dispatch(&ActionDescriptor::for_test("fill_field_by_index", json!({"index": 2, "value": "rust"})))
            .await;
        assert_eq!(out.message.as_deref(), Some("2=rust"));
    }

    #[tokio::test]
    async fn test_execute_bypasses_descriptor() {
        let out = executor()
            .execute(BrowserAction::Navigate { url: "https://yandex.ru".to_string() })
            .await;
        assert!(out.success);
        assert_eq!(out.url(), Some("https://yandex.ru"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_failure() {
        let out = executor()
            .dispatch(&ActionDescriptor::for_test("rm_rf", json!({})))
            .await;
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("Неизвестный инструмент: rm_rf"));
    }

    #[tokio::test]
    async fn test_capability_error_and_unsupported_are_caught() {
        let out = executor()
            .dispatch(&ActionDescriptor::for_test("extract_page_snapshot", json!({})))
            .await;
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("tab crashed"));

        let out = executor()
            .dispatch(&ActionDescriptor::for_test("press_enter", json!({})))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("press_enter"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failure() {
        let out = executor()
            .dispatch(&ActionDescriptor::for_test("click_element_by_index", json!({"index": 0})))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("click_element_by_index"));
    }

    #[tokio::test]
    async fn test_timed_out_call_does_not_overlap_next_one() {
        let browser = Arc::new(LaneBrowser::default());
        let exec = ToolExecutor::new(browser.clone(), 1);

        let first = exec
            .dispatch(&ActionDescriptor::for_test(
                "wait_for_element",
                json!({"selector": "#results", "timeout": 60000}),
            ))
            .await;
        assert!(!first.success);
        assert!(first.error.unwrap().contains("wait_for_element"));

        // 前一个阻塞操作仍在跑，下一个操作等它结束后才开始
        let second = exec
            .dispatch(&ActionDescriptor::for_test("navigate", json!({"url": "https://ya.ru"})))
            .await;
        assert!(second.success);
        assert_eq!(browser.peak.load(Ordering::SeqCst), 1);
        assert_eq!(*browser.waits.lock().unwrap(), vec![800]);
    }

    #[tokio::test]
    async fn test_short_wait_is_passed_through() {
        let browser = Arc::new(LaneBrowser::default());
        let exec = ToolExecutor::new(browser.clone(), 30);
        exec.execute(BrowserAction::WaitForElement {
            selector: "#q".to_string(),
            timeout_ms: 5_000,
        })
        .await;
        exec.execute(BrowserAction::WaitForElement {
            selector: "#q".to_string(),
            timeout_ms: 60_000,
        })
        .await;
        assert_eq!(*browser.waits.lock().unwrap(), vec![5_000, 24_000]);
    }

    #[tokio::test]
    async fn test_analysis_result_is_cached() {
        let llm = Arc::new(MockLlmClient::scripted([
            r#"{"analysis": [{"index": 0, "is_spam": true, "reason": "лотерея"}]}"#,
        ]));
        let exec = executor().with_analyzer(Analyzer::new(llm));
        assert!(exec.last_analysis(AnalysisKind::Spam).is_none());

        let out = exec
            .dispatch(&ActionDescriptor::for_test(
                "sub_agent_analysis",
                json!({"type": "spam", "items": ["Вы выиграли!"]}),
            ))
            .await;
        assert!(out.success);
        let cached = exec.last_analysis(AnalysisKind::Spam).unwrap();
        assert_eq!(cached.total(), 1);
        assert!(exec.last_analysis(AnalysisKind::JobRelevance).is_none());
    }

    #[tokio::test]
    async fn test_unparseable_analysis_carries_raw_reply() {
        let llm = Arc::new(MockLlmClient::scripted(["извините"]));
        let exec = executor().with_analyzer(Analyzer::new(llm));
        let out = exec
            .dispatch(&ActionDescriptor::for_test("sub_agent_analysis", json!({"items": ["x"]})))
            .await;
        assert!(!out.success);
        assert_eq!(out.get_str("raw_response"), Some("извините"));
        assert!(exec.last_analysis(AnalysisKind::Spam).is_none());
    }
}
