//! 记忆层：单次任务的对话状态（即模型的短期记忆）

pub mod conversation;

pub use conversation::{Conversation, Message, Role};
