//! 安全层：危险动作判定与用户确认

pub mod confirm;
pub mod danger;

pub use confirm::{Answer, AutoConfirm, Confirmer, ConsoleConfirmer, Vocabulary};
pub use danger::{DangerGate, IntentOverride};
