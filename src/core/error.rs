//! Agent 错误类型与恢复动作
//!
//! 任务循环内的错误（格式错误、工具失败、卡住）不会以 Err 形式出现，而是作为观察写回对话；
//! AgentError 只覆盖组件装配阶段（system prompt、浏览器启动）。

use thiserror::Error;

/// 装配或启动 Agent 时可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("System prompt error: {0}")]
    SystemPrompt(String),
}

/// 恢复引擎根据卡住信号给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 将纠正提示注入下一轮，让模型重试（格式错误）
    RetryWithPrompt(String),
    /// 绕过模型直接导航到锚点页面（连续空白页）
    NavigateToAnchor(String),
    /// 终止当前任务
    Abort,
}
