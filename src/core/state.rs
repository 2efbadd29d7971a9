//! 循环状态定义：LoopStatus（运行中 / 各类终止原因）与 GuardKind
//!
//! Running 为唯一非终止状态；其余状态一旦进入，Planner 立即退出循环。

use serde::Serialize;

use crate::core::AgentError;

/// 触发终止的安全护栏类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    /// 同一 (intent, params) 已成功执行过，拒绝再次执行
    RepeatedSuccess,
    /// 同一非零状态码出现在多个不同动作上
    RepeatedFailure,
}

impl std::fmt::Display for GuardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardKind::RepeatedSuccess => write!(f, "repeated successful action"),
            GuardKind::RepeatedFailure => write!(f, "repeated failure status"),
        }
    }
}

/// 规划循环状态
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopStatus {
    Running,
    /// LLM 给出 stop=true 且未被护栏否决
    StoppedByModel,
    StoppedByGuard(GuardKind),
    StoppedByDisallowedIntent(String),
    StoppedByUnknownIntent(String),
    StoppedByMaxSteps,
    StoppedByOracleError(String),
    /// 用户中断（Ctrl-C / CancellationToken）
    Cancelled,
}

impl LoopStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopStatus::Running)
    }

    /// 是否由安全护栏终止（区分「模型说停」与「护栏叫停」）
    pub fn is_guard(&self) -> bool {
        matches!(self, LoopStatus::StoppedByGuard(_))
    }

    /// 非正常终止对应的错误；Running、模型停止与步数耗尽返回 None
    pub fn error(&self) -> Option<AgentError> {
        match self {
            LoopStatus::StoppedByGuard(kind) => Some(AgentError::GuardTripped(kind.to_string())),
            LoopStatus::StoppedByDisallowedIntent(i) => Some(AgentError::DisallowedIntent(i.clone())),
            LoopStatus::StoppedByUnknownIntent(i) => Some(AgentError::UnknownIntent(i.clone())),
            LoopStatus::StoppedByOracleError(e) => Some(AgentError::OracleError(e.clone())),
            LoopStatus::Cancelled => Some(AgentError::Cancelled),
            LoopStatus::Running | LoopStatus::StoppedByModel | LoopStatus::StoppedByMaxSteps => None,
        }
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopStatus::Running => write!(f, "RUNNING"),
            LoopStatus::StoppedByModel => write!(f, "STOPPED_BY_MODEL"),
            LoopStatus::StoppedByGuard(kind) => write!(f, "STOPPED_BY_GUARD ({})", kind),
            LoopStatus::StoppedByDisallowedIntent(i) => {
                write!(f, "STOPPED_BY_DISALLOWED_INTENT ({})", i)
            }
            LoopStatus::StoppedByUnknownIntent(i) => write!(f, "STOPPED_BY_UNKNOWN_INTENT ({})", i),
            LoopStatus::StoppedByMaxSteps => write!(f, "STOPPED_BY_MAX_STEPS"),
            LoopStatus::StoppedByOracleError(e) => write!(f, "STOPPED_BY_ORACLE_ERROR ({})", e),
            LoopStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_running_is_non_terminal() {
        assert!(!LoopStatus::Running.is_terminal());
        assert!(LoopStatus::StoppedByModel.is_terminal());
        assert!(LoopStatus::Cancelled.is_terminal());
        assert!(LoopStatus::StoppedByGuard(GuardKind::RepeatedFailure).is_guard());
        assert!(!LoopStatus::StoppedByModel.is_guard());
    }

    #[test]
    fn test_guard_status_display_is_distinguishable() {
        let s = LoopStatus::StoppedByGuard(GuardKind::RepeatedSuccess).to_string();
        assert!(s.starts_with("STOPPED_BY_GUARD"));
        assert_ne!(s, LoopStatus::StoppedByModel.to_string());
    }

    #[test]
    fn test_abnormal_stops_map_to_errors() {
        assert_eq!(
            LoopStatus::StoppedByGuard(GuardKind::RepeatedFailure).error(),
            Some(AgentError::GuardTripped("repeated failure status".to_string()))
        );
        assert_eq!(
            LoopStatus::StoppedByDisallowedIntent("rm_rf".to_string()).error(),
            Some(AgentError::DisallowedIntent("rm_rf".to_string()))
        );
        assert_eq!(LoopStatus::Cancelled.error(), Some(AgentError::Cancelled));
        assert_eq!(LoopStatus::StoppedByModel.error(), None);
        assert_eq!(LoopStatus::StoppedByMaxSteps.error(), None);
    }
}
