//! 核心层：错误与恢复动作、任务终态、卡住恢复策略

pub mod error;
pub mod outcome;
pub mod recovery;

pub use error::{AgentError, RecoveryAction};
pub use outcome::{TaskOutcome, BLANK_URL};
pub use recovery::{RecoveryEngine, FORMAT_CORRECTION};
