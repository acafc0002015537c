//! 认知层：动作解析、Planner、任务状态机与异步主循环、观察渲染

pub mod events;
pub mod loop_;
pub mod observation;
pub mod parser;
pub mod planner;
pub mod state;

pub use events::TaskEvent;
pub use loop_::TaskSession;
pub use observation::{final_section, render_outcome};
pub use parser::{extract_json_object, parse_action, parse_json_object, ActionDescriptor};
pub use planner::{build_system_prompt, load_contract, Planner};
pub use state::{LoopConfig, LoopEffect, LoopInput, Phase, StuckCounters, TaskMachine, TaskState};
