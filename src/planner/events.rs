//! 规划过程事件：供前端实时展示思考、动作、观察、护栏与结束状态

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerEvent {
    StepStarted { step: usize, max_steps: usize },
    /// LLM 给出的推理与状态报告
    Thought {
        step: usize,
        thought: String,
        report: String,
    },
    Action {
        step: usize,
        intent: String,
        params: serde_json::Value,
    },
    /// 执行结果（预览，避免过长）
    Observation {
        step: usize,
        status_code: i32,
        preview: String,
    },
    /// 护栏介入（包括否决 stop、改写意图与终止）
    Guard { step: usize, detail: String },
    Finished { status: String, steps: usize },
}
