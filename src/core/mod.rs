//! 核心层：错误分类与循环终止状态

pub mod error;
pub mod state;

pub use error::AgentError;
pub use state::{GuardKind, LoopStatus};
