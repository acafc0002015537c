//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序回放预先写好的回复；同时记录每次收到的对话，便于断言任务循环发给模型的内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// Mock 客户端：脚本耗尽后返回 ApiError
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    /// 依次返回给定回复
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// 回复中可混入传输错误
    pub fn with_results(results: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已调用次数
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 每次调用收到的完整对话（按调用顺序）
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(messages.to_vec());
        }
        self.script
            .lock()
            .map_err(|e| LlmError::ApiError(e.to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ApiError("mock script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_fails() {
        let mock = MockLlmClient::scripted(["a", "b"]);
        let msgs = vec![Message::user("hi")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "a");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "b");
        assert!(mock.complete(&msgs).await.is_err());
        assert_eq!(mock.call_count(), 3);
    }
}
