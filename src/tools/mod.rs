//! 工具层：动作注册表、浏览器能力接口、执行器

pub mod action;
pub mod capability;
pub mod executor;
pub mod outcome;
pub mod schema;

#[cfg(feature = "browser")]
pub mod browser;

pub use action::{ActionError, ActionSpec, BrowserAction, ScrollDirection, CATALOG};
pub use capability::{BlockingLane, BrowserCapability, CapabilityResult};
pub use executor::ToolExecutor;
pub use outcome::ToolOutcome;
pub use schema::tool_call_schema_json;

#[cfg(feature = "browser")]
pub use browser::ChromeBrowser;
