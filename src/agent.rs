//! Agent 运行时
//!
//! create_agent_components 按配置装配 TaskMachine / Planner / ToolExecutor / Confirmer；
//! BrowserAgent 在此之上对单个任务跑主循环并返回 TaskOutcome。
//! 浏览器能力与 LLM 由调用方提供（CLI 用 Chrome + OpenAI 兼容端点，测试用 stub + Mock）。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::analysis::{AnalysisKind, AnalysisReport, Analyzer};
use crate::config::{AppConfig, ConfirmSection};
use crate::core::{AgentError, TaskOutcome};
use crate::guard::{AutoConfirm, Confirmer, ConsoleConfirmer, Vocabulary};
use crate::llm::{LlmClient, OpenAiClient};
use crate::react::{build_system_prompt, load_contract, Planner, TaskEvent, TaskMachine, TaskSession};
use crate::tools::{BrowserCapability, ToolExecutor};

/// 预构建的 Agent 组件，可依次运行多个任务（任务之间不共享循环状态）
pub struct AgentComponents {
    pub machine: TaskMachine,
    pub planner: Planner,
    pub executor: ToolExecutor,
    pub confirmer: Box<dyn Confirmer>,
}

/// 按 [llm] 段创建 OpenAI 兼容客户端
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    Arc::new(OpenAiClient::from_config(&cfg.llm))
}

/// 按 [confirm] 段选择确认通道：auto_approve 时全部放行，否则控制台交互
pub fn default_confirmer(section: &ConfirmSection) -> Box<dyn Confirmer> {
    if section.auto_approve {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(ConsoleConfirmer::new(Vocabulary::from_config(section)))
    }
}

/// 创建 Agent 组件：system prompt（文件或内置约定）、状态机参数、执行器超时、分析器
pub fn create_agent_components(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    capability: Arc<dyn BrowserCapability>,
    confirmer: Box<dyn Confirmer>,
) -> Result<AgentComponents, AgentError> {
    let contract = load_contract(cfg.app.system_prompt_path.as_deref())?;
    let analyzer = Analyzer::from_config(llm.clone(), &cfg.analysis);

    Ok(AgentComponents {
        machine: TaskMachine::from_config(&cfg.agent),
        planner: Planner::new(llm, build_system_prompt(&contract)),
        executor: ToolExecutor::new(capability, cfg.tools.tool_timeout_secs).with_analyzer(analyzer),
        confirmer,
    })
}

/// 浏览器智能体
pub struct BrowserAgent {
    components: AgentComponents,
}

impl BrowserAgent {
    pub fn new(components: AgentComponents) -> Self {
        Self { components }
    }

    pub fn from_config(
        cfg: &AppConfig,
        llm: Arc<dyn LlmClient>,
        capability: Arc<dyn BrowserCapability>,
        confirmer: Box<dyn Confirmer>,
    ) -> Result<Self, AgentError> {
        create_agent_components(cfg, llm, capability, confirmer).map(Self::new)
    }

    fn session(&self) -> TaskSession<'_> {
        let c = &self.components;
        TaskSession::new(&c.machine, &c.planner, &c.executor, c.confirmer.as_ref())
    }

    /// 运行一个任务直到终态
    pub async fn run_task(&self, task: &str) -> TaskOutcome {
        self.session().run_task(task).await
    }

    /// 运行任务并通过 event_tx 推送过程事件
    pub async fn run_task_with_events(
        &self,
        task: &str,
        event_tx: &mpsc::UnboundedSender<TaskEvent>,
    ) -> TaskOutcome {
        self.session().with_event_tx(event_tx).run_task(task).await
    }

    /// 运行任务并返回面向用户的结果文本
    pub async fn execute_task(&self, task: &str) -> String {
        self.run_task(task).await.to_string()
    }

    /// 本 Agent 上某类分析最近一次的报告
    pub fn last_analysis(&self, kind: AnalysisKind) -> Option<AnalysisReport> {
        self.components.executor.last_analysis(kind)
    }

    /// LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.components.planner.token_usage()
    }
}
