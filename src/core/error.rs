//! 规划循环错误分类
//!
//! 与 Planner 配合：UnknownIntent / DisallowedIntent / OracleError 终止循环；
//! ExecutionError 只进入 Observation 反馈给下一轮，不直接终止。

use thiserror::Error;

/// 规划与执行过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Unknown intent: {0}")]
    UnknownIntent(String),

    #[error("Intent not allowed: {0}")]
    DisallowedIntent(String),

    /// LLM 调用失败、超时或返回非法 JSON
    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Execution failed: {0}")]
    ExecutionError(String),

    #[error("Guard tripped: {0}")]
    GuardTripped(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}
