//! browser-pilot - LLM 驱动的浏览器智能体
//!
//! 模块划分：
//! - **agent**: 组件装配与 BrowserAgent 运行时
//! - **analysis**: 文本批量分类子程序（垃圾信息 / 职位匹配）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、任务结果、卡住恢复策略
//! - **guard**: 危险动作判定与用户确认
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 单次任务的对话状态
//! - **observability**: tracing 初始化
//! - **react**: 动作解析、状态机、主循环、观察渲染
//! - **tools**: 动作注册表、浏览器能力接口、执行器

pub mod agent;
pub mod analysis;
pub mod config;
pub mod core;
pub mod guard;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::agent::{create_agent_components, AgentComponents, BrowserAgent};
pub use crate::config::{load_config, AppConfig};
pub use crate::core::{AgentError, TaskOutcome};
pub use crate::tools::{BrowserCapability, ToolOutcome};
