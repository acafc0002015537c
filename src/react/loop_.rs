//! 任务主循环（异步驱动）
//!
//! 反复执行状态机给出的 effect：调用模型 → 确认 → 执行动作 → 恢复，直到 Finish。
//! effect 严格串行；每个任务有独立的 TaskState，不与其它任务共享。
//! 可选 event_tx：向 CLI / 前端推送 TurnStarted / ToolCall / Observation / Finished 等事件。

use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::TaskOutcome;
use crate::guard::Confirmer;
use crate::react::state::{LoopEffect, LoopInput, TaskMachine};
use crate::react::{Planner, TaskEvent};
use crate::tools::{BrowserAction, ToolExecutor};

/// 思考内容展示最大字符数
const THINKING_PREVIEW_CHARS: usize = 500;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 一次任务运行所需的组件（均为借用，由 Agent 持有）
pub struct TaskSession<'a> {
    pub machine: &'a TaskMachine,
    pub planner: &'a Planner,
    pub executor: &'a ToolExecutor,
    pub confirmer: &'a dyn Confirmer,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a UnboundedSender<TaskEvent>>,
}

impl<'a> TaskSession<'a> {
    pub fn new(
        machine: &'a TaskMachine,
        planner: &'a Planner,
        executor: &'a ToolExecutor,
        confirmer: &'a dyn Confirmer,
    ) -> Self {
        Self {
            machine,
            planner,
            executor,
            confirmer,
            event_tx: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<TaskEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: TaskEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 运行一个任务直到终态
    pub async fn run_task(&self, task: &str) -> TaskOutcome {
        let task_id = Uuid::new_v4();
        self.drive(task).instrument(tracing::info_span!("task", %task_id)).await
    }

    async fn drive(&self, task: &str) -> TaskOutcome {
        let max_turns = self.machine.config().max_turns;
        tracing::info!(task = %task, max_turns, "task started");

        let (mut state, mut effect) = self.machine.start(self.planner.system_prompt(), task);
        loop {
            let input = match effect {
                LoopEffect::CallModel => {
                    let turn = state.turn() + 1;
                    self.send_event(TaskEvent::TurnStarted { turn, max_turns });
                    tracing::info!(turn, max_turns, "thinking");
                    match self.planner.plan(state.conversation()).await {
                        Ok(reply) => {
                            self.send_event(TaskEvent::Thinking {
                                text: preview(&reply, THINKING_PREVIEW_CHARS),
                            });
                            LoopInput::ModelReplied(reply)
                        }
                        Err(e) => {
                            tracing::error!(turn, error = %e, "model call failed");
                            LoopInput::ModelFailed(e)
                        }
                    }
                }
                LoopEffect::Confirm(action) => {
                    self.send_event(TaskEvent::ConfirmationRequested {
                        tool: action.name().to_string(),
                        args: serde_json::Value::Object(action.arguments().clone()),
                    });
                    let approved = self.confirmer.confirm(&action).await;
                    tracing::info!(tool = %action.name(), approved, "confirmation answered");
                    LoopInput::Confirmed(approved)
                }
                LoopEffect::Dispatch(action) => {
                    self.send_event(TaskEvent::ToolCall {
                        tool: action.name().to_string(),
                        args: serde_json::Value::Object(action.arguments().clone()),
                    });
                    tracing::info!(turn = state.turn(), tool = %action.name(), args = %action.arguments_text(), "acting");
                    let outcome = self.executor.dispatch(&action).await;
                    self.send_event(TaskEvent::Observation {
                        tool: action.name().to_string(),
                        success: outcome.success,
                        preview: preview(
                            outcome
                                .message
                                .as_deref()
                                .or(outcome.error.as_deref())
                                .unwrap_or_default(),
                            OBSERVATION_PREVIEW_CHARS,
                        ),
                    });
                    LoopInput::Observed(outcome)
                }
                LoopEffect::Recover { url } => {
                    let outcome = self
                        .executor
                        .execute(BrowserAction::Navigate { url: url.clone() })
                        .await;
                    tracing::info!(url = %url, success = outcome.success, "recovery navigation");
                    self.send_event(TaskEvent::Recovery {
                        url,
                        success: outcome.success,
                    });
                    LoopInput::Recovered(outcome)
                }
                LoopEffect::Finish(outcome) => {
                    tracing::info!(turns = outcome.turns(), done = outcome.is_done(), "task finished");
                    self.send_event(TaskEvent::Finished {
                        outcome: outcome.to_string(),
                    });
                    return outcome;
                }
            };
            let format_errors = state.counters().consecutive_format_errors;
            (state, effect) = self.machine.step(state, input);
            let attempt = state.counters().consecutive_format_errors;
            let completed = matches!(effect, LoopEffect::Finish(TaskOutcome::Done { .. }));
            if attempt > format_errors && !completed {
                self.send_event(TaskEvent::FormatError { attempt });
            }
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
