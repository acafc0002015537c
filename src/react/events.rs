//! 任务过程事件：供 CLI / 前端展示思考、动作、观察与恢复

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// 新一轮开始（第几轮 / 预算）
    TurnStarted { turn: usize, max_turns: usize },
    /// 模型回复（预览）
    Thinking { text: String },
    /// 回复中没有可用的 tool call
    FormatError { attempt: usize },
    /// 危险动作等待确认
    ConfirmationRequested { tool: String, args: serde_json::Value },
    /// 执行动作
    ToolCall { tool: String, args: serde_json::Value },
    /// 动作结果（预览）
    Observation { tool: String, success: bool, preview: String },
    /// 卡住恢复
    Recovery { url: String, success: bool },
    /// 任务结束
    Finished { outcome: String },
}
