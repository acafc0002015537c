//! 浏览器能力接口
//!
//! 任务循环只通过这个 trait 操作页面；元素定位、快照提取等细节由实现方负责。
//! 每个方法对应注册表中的一个动作，返回 Err 时由执行器转为失败的 ToolOutcome。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::tools::{ScrollDirection, ToolOutcome};

pub type CapabilityResult = Result<ToolOutcome, String>;

/// 同步页面操作的串行通道
///
/// 闭包在阻塞线程内持锁执行。执行器超时只会放弃等待，已开始的闭包仍会跑完；
/// 下一次调用要等它释放锁后才开始，同一页面上不会有两个操作重叠。
#[derive(Debug, Clone, Default)]
pub struct BlockingLane {
    gate: Arc<Mutex<()>>,
}

impl BlockingLane {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F>(&self, f: F) -> CapabilityResult
    where
        F: FnOnce() -> CapabilityResult + Send + 'static,
    {
        let gate = Arc::clone(&self.gate);
        tokio::task::spawn_blocking(move || {
            let _guard = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        })
        .await
        .map_err(|e| format!("Task join: {}", e))?
    }
}

/// 未实现的能力统一返回此错误
fn unsupported(action: &str) -> CapabilityResult {
    Err(format!("Действие {} не поддерживается этим браузером", action))
}

/// 浏览器能力：navigate / extract_page_snapshot 的结果需带 url（快照还需 elements、element_count、title）
#[async_trait]
pub trait BrowserCapability: Send + Sync {
    async fn navigate(&self, url: &str) -> CapabilityResult;

    async fn extract_page_snapshot(&self) -> CapabilityResult;

    async fn click_element_by_index(&self, index: usize) -> CapabilityResult;

    async fn fill_field_by_index(&self, index: usize, value: &str) -> CapabilityResult;

    async fn extract_list_items(&self, _max_count: usize) -> CapabilityResult {
        unsupported("extract_list_items")
    }

    async fn extract_table_data(&self, _max_rows: usize) -> CapabilityResult {
        unsupported("extract_table_data")
    }

    async fn extract_element_text(&self, _index: usize) -> CapabilityResult {
        unsupported("extract_element_text")
    }

    async fn scroll(&self, _direction: ScrollDirection, _amount: u32) -> CapabilityResult {
        unsupported("scroll")
    }

    async fn press_enter(&self) -> CapabilityResult {
        unsupported("press_enter")
    }

    async fn check_checkbox(&self, _index: usize) -> CapabilityResult {
        unsupported("check_checkbox")
    }

    async fn hover_element(&self, _index: usize) -> CapabilityResult {
        unsupported("hover_element")
    }

    async fn get_current_url(&self) -> CapabilityResult {
        unsupported("get_current_url")
    }

    async fn wait_for_navigation(&self) -> CapabilityResult {
        unsupported("wait_for_navigation")
    }

    async fn wait_for_element(&self, _selector: &str, _timeout_ms: u64) -> CapabilityResult {
        unsupported("wait_for_element")
    }
}
