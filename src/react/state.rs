//! 任务循环状态机（纯函数）
//!
//! `TaskMachine::step(state, input) -> (state', effect)`：不做 I/O，只决定下一步要做什么。
//! 异步驱动（loop_.rs）负责执行 effect 并把结果作为下一个 input 送回。
//!
//! 阶段流转：Thinking →（Acting | AwaitingConfirmation）→ Observing →（Thinking | Recovering | Finished）。
//! Observing 在一次 step 内完成，不单独成为阶段。

use crate::config::AgentSection;
use crate::core::{RecoveryAction, RecoveryEngine, TaskOutcome, BLANK_URL};
use crate::guard::DangerGate;
use crate::llm::LlmError;
use crate::memory::{Conversation, Message};
use crate::react::observation::{final_section, mentions_completion, render_outcome, OBSERVATION_PREFIX};
use crate::react::{parse_action, ActionDescriptor};
use crate::tools::action::{EXTRACT_PAGE_SNAPSHOT, NAVIGATE};
use crate::tools::ToolOutcome;

/// 用户拒绝危险动作时的合成结果
pub const CANCELLED_BY_USER: &str = "Действие отменено пользователем";

/// 循环参数（来自 [agent] 段）
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_turns: usize,
    pub warmup_turns: usize,
    pub long_reply_chars: usize,
    pub completion_phrases: Vec<String>,
    pub summary_keywords: Vec<String>,
}

impl LoopConfig {
    pub fn from_config(section: &AgentSection) -> Self {
        Self {
            max_turns: section.max_turns,
            warmup_turns: section.warmup_turns,
            long_reply_chars: section.long_reply_chars,
            completion_phrases: section.completion_phrases.clone(),
            summary_keywords: section.summary_keywords.clone(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_config(&AgentSection::default())
    }
}

/// 卡住检测计数器：每轮最多更新一次，只属于一个任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckCounters {
    pub consecutive_format_errors: usize,
    pub consecutive_blank_pages: usize,
    pub last_known_url: String,
}

impl Default for StuckCounters {
    fn default() -> Self {
        Self {
            consecutive_format_errors: 0,
            consecutive_blank_pages: 0,
            last_known_url: BLANK_URL.to_string(),
        }
    }
}

/// 当前阶段
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Thinking,
    AwaitingConfirmation(ActionDescriptor),
    Acting(ActionDescriptor),
    Recovering { url: String },
    Finished(TaskOutcome),
}

/// 状态机输入：上一个 effect 的执行结果
#[derive(Debug, Clone)]
pub enum LoopInput {
    ModelReplied(String),
    ModelFailed(LlmError),
    Confirmed(bool),
    Observed(ToolOutcome),
    Recovered(ToolOutcome),
}

/// 状态机要求驱动执行的下一步
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEffect {
    CallModel,
    Confirm(ActionDescriptor),
    Dispatch(ActionDescriptor),
    Recover { url: String },
    Finish(TaskOutcome),
}

/// 单个任务的全部可变状态；run_task 开始时创建，结束时丢弃
#[derive(Debug, Clone)]
pub struct TaskState {
    task: String,
    conversation: Conversation,
    counters: StuckCounters,
    turn: usize,
    phase: Phase,
    last_reply: String,
}

impl TaskState {
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn counters(&self) -> &StuckCounters {
        &self.counters
    }

    /// 已消耗的模型调用轮数
    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn last_reply(&self) -> &str {
        &self.last_reply
    }
}

/// 状态机：持有循环参数、恢复策略与危险判定
#[derive(Debug, Clone, Default)]
pub struct TaskMachine {
    config: LoopConfig,
    recovery: RecoveryEngine,
    gate: DangerGate,
}

impl TaskMachine {
    pub fn new(config: LoopConfig, recovery: RecoveryEngine, gate: DangerGate) -> Self {
        Self {
            config,
            recovery,
            gate,
        }
    }

    pub fn from_config(section: &AgentSection) -> Self {
        Self::new(
            LoopConfig::from_config(section),
            RecoveryEngine::from_config(section),
            DangerGate::new(),
        )
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Init：种下 system + 任务消息，计数器归零，要求第一次模型调用
    pub fn start(&self, system_prompt: &str, task: &str) -> (TaskState, LoopEffect) {
        let state = TaskState {
            task: task.to_string(),
            conversation: Conversation::seeded(system_prompt, task),
            counters: StuckCounters::default(),
            turn: 0,
            phase: Phase::Thinking,
            last_reply: String::new(),
        };
        (state, LoopEffect::CallModel)
    }

    pub fn step(&self, mut state: TaskState, input: LoopInput) -> (TaskState, LoopEffect) {
        let phase = std::mem::replace(&mut state.phase, Phase::Thinking);
        match (phase, input) {
            (Phase::Thinking, LoopInput::ModelReplied(reply)) => self.on_reply(state, reply),
            (Phase::Thinking, LoopInput::ModelFailed(error)) => {
                state.turn += 1;
                let turns = state.turn;
                self.finish(state, TaskOutcome::TransportFailure { error, turns })
            }
            (Phase::AwaitingConfirmation(action), LoopInput::Confirmed(true)) => {
                state.phase = Phase::Acting(action.clone());
                (state, LoopEffect::Dispatch(action))
            }
            (Phase::AwaitingConfirmation(action), LoopInput::Confirmed(false)) => {
                tracing::info!(tool = %action.name(), "action declined by user");
                self.observe(state, &action, ToolOutcome::skipped(CANCELLED_BY_USER))
            }
            (Phase::Acting(action), LoopInput::Observed(outcome)) => self.observe(state, &action, outcome),
            (Phase::Recovering { .. }, LoopInput::Recovered(outcome)) => self.on_recovered(state, outcome),
            (phase, input) => {
                tracing::warn!(?phase, ?input, "unexpected loop input ignored");
                state.phase = phase;
                let effect = Self::resume(&state.phase);
                (state, effect)
            }
        }
    }

    /// 阶段本身隐含的 effect（收到与阶段不符的输入时重发）
    fn resume(phase: &Phase) -> LoopEffect {
        match phase {
            Phase::Thinking => LoopEffect::CallModel,
            Phase::AwaitingConfirmation(action) => LoopEffect::Confirm(action.clone()),
            Phase::Acting(action) => LoopEffect::Dispatch(action.clone()),
            Phase::Recovering { url } => LoopEffect::Recover { url: url.clone() },
            Phase::Finished(outcome) => LoopEffect::Finish(outcome.clone()),
        }
    }

    fn finish(&self, mut state: TaskState, outcome: TaskOutcome) -> (TaskState, LoopEffect) {
        state.phase = Phase::Finished(outcome.clone());
        (state, LoopEffect::Finish(outcome))
    }

    /// 本轮结束：预算用尽则终止，否则继续思考
    fn next_turn(&self, mut state: TaskState) -> (TaskState, LoopEffect) {
        if state.turn >= self.config.max_turns {
            let last_url = Some(state.counters.last_known_url.clone()).filter(|u| !is_blank_url(u));
            let outcome = TaskOutcome::BudgetExhausted {
                max_turns: self.config.max_turns,
                last_url,
            };
            return self.finish(state, outcome);
        }
        state.phase = Phase::Thinking;
        (state, LoopEffect::CallModel)
    }

    fn done(&self, state: TaskState) -> (TaskState, LoopEffect) {
        let summary = final_section(&state.last_reply, &self.config.summary_keywords).to_string();
        let turns = state.turn;
        self.finish(state, TaskOutcome::Done { summary, turns })
    }

    fn on_reply(&self, mut state: TaskState, reply: String) -> (TaskState, LoopEffect) {
        state.turn += 1;
        state.conversation.push(Message::assistant(reply.clone()));
        state.last_reply = reply;

        let Some(action) = parse_action(&state.last_reply) else {
            state.counters.consecutive_format_errors += 1;
            let errors = state.counters.consecutive_format_errors;
            if mentions_completion(&state.last_reply, &self.config.completion_phrases) {
                return self.done(state);
            }
            return match self.recovery.on_format_error(errors) {
                RecoveryAction::RetryWithPrompt(prompt) => {
                    tracing::warn!(turn = state.turn, errors, "reply has no valid tool call");
                    state.conversation.push(Message::user(prompt));
                    self.next_turn(state)
                }
                _ => {
                    let outcome = TaskOutcome::FormatFailure {
                        last_reply: state.last_reply.clone(),
                        attempts: errors,
                        turns: state.turn,
                    };
                    self.finish(state, outcome)
                }
            };
        };

        state.counters.consecutive_format_errors = 0;
        if self.gate.is_dangerous(action.name(), action.arguments(), &state.task) {
            state.phase = Phase::AwaitingConfirmation(action.clone());
            return (state, LoopEffect::Confirm(action));
        }
        state.phase = Phase::Acting(action.clone());
        (state, LoopEffect::Dispatch(action))
    }

    fn observe(
        &self,
        mut state: TaskState,
        action: &ActionDescriptor,
        outcome: ToolOutcome,
    ) -> (TaskState, LoopEffect) {
        let rendered = render_outcome(action.name(), &outcome);
        state
            .conversation
            .push(Message::user(format!("{}{}", OBSERVATION_PREFIX, rendered)));
        self.track_blank_page(&mut state.counters, action.name(), &outcome);

        if self.is_complete(&state) {
            return self.done(state);
        }

        if let Some(RecoveryAction::NavigateToAnchor(url)) =
            self.recovery.on_blank_pages(state.counters.consecutive_blank_pages)
        {
            tracing::warn!(
                blanks = state.counters.consecutive_blank_pages,
                url = %url,
                "stuck on blank page, recovering"
            );
            state.phase = Phase::Recovering { url: url.clone() };
            return (state, LoopEffect::Recover { url });
        }

        self.next_turn(state)
    }

    fn on_recovered(&self, mut state: TaskState, outcome: ToolOutcome) -> (TaskState, LoopEffect) {
        state
            .conversation
            .push(Message::system(self.recovery.recovery_note(outcome.success)));
        state.counters.consecutive_blank_pages = 0;
        if outcome.success {
            if let Some(url) = outcome.url().filter(|u| !is_blank_url(u)) {
                state.counters.last_known_url = url.to_string();
            }
        }
        self.next_turn(state)
    }

    fn track_blank_page(&self, counters: &mut StuckCounters, action_name: &str, outcome: &ToolOutcome) {
        let url = outcome.url().unwrap_or_default();
        let blank = match action_name {
            EXTRACT_PAGE_SNAPSHOT if outcome.success => is_blank_url(url) || outcome.element_count() == 0,
            NAVIGATE => !outcome.success || is_blank_url(url),
            _ => return,
        };
        if blank {
            counters.consecutive_blank_pages += 1;
        } else {
            counters.consecutive_blank_pages = 0;
            counters.last_known_url = url.to_string();
        }
    }

    /// 完成判定：过了热身轮、出现完成短语，且回复不像又一次工具调用
    fn is_complete(&self, state: &TaskState) -> bool {
        if state.turn <= self.config.warmup_turns {
            return false;
        }
        let reply = &state.last_reply;
        if !mentions_completion(reply, &self.config.completion_phrases) {
            return false;
        }
        !reply.to_lowercase().contains("tool") || reply.chars().count() < self.config.long_reply_chars
    }
}

fn is_blank_url(url: &str) -> bool {
    url.trim().is_empty() || url == BLANK_URL
}
