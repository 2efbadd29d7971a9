//! 单个规划会话的状态：步数、白名单、已执行动作、上一步观察与循环状态
//!
//! 由一个 Planner 会话独占，不跨会话共享。

use std::collections::BTreeSet;

use serde::Serialize;

use crate::actions::Observation;
use crate::core::LoopStatus;
use crate::planner::SeenActions;

#[derive(Debug, Clone, Serialize)]
pub struct PlannerState {
    /// 已开始的步数（1 起）
    pub step: usize,
    pub max_steps: usize,
    pub allowed_intents: BTreeSet<String>,
    pub seen_actions: SeenActions,
    pub last_observation: Observation,
    pub status: LoopStatus,
}

impl PlannerState {
    pub fn new(max_steps: usize, allowed_intents: BTreeSet<String>) -> Self {
        Self {
            step: 0,
            max_steps,
            allowed_intents,
            seen_actions: SeenActions::new(),
            last_observation: Observation::new(0, "(start)", ""),
            status: LoopStatus::Running,
        }
    }

    pub fn is_allowed(&self, intent: &str) -> bool {
        self.allowed_intents.contains(intent)
    }

    /// 按字母序排列的白名单（用于 Prompt）
    pub fn allowed_list(&self) -> Vec<String> {
        self.allowed_intents.iter().cloned().collect()
    }
}
