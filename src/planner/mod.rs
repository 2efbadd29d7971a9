//! 规划层：Prompt 拼装、Oracle 决策解析、安全护栏与自主规划循环

pub mod decision;
pub mod events;
pub mod guards;
pub mod loop_;
pub mod prompt;
pub mod state;

pub use decision::{parse_decision, OracleDecision};
pub use events::PlannerEvent;
pub use guards::{judge_stop, ActionKey, GoalHeuristics, SeenAction, SeenActions, StopVerdict};
pub use loop_::{Planner, PlannerReport};
pub use prompt::{compose_prompt, PromptParts, SYSTEM_PROMPT};
pub use state::PlannerState;
