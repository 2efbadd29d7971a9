//! 动作层：把意图规格 + 参数展开为可执行条目，并顺序执行、汇总为 Observation
//!
//! 一个规划步骤对应一次 ActionBuilder::build + ActionExecutor::run。

pub mod builder;
pub mod confirm;
pub mod executor;

use serde::Serialize;
use serde_json::Value;

pub use builder::ActionBuilder;
pub use confirm::{Approver, AutoApprove, StdinApprover};
pub use executor::{ActionExecutor, Observation};

/// LLM 给出的参数表（保持键的原始顺序）；值限定为字符串 / 数字 / 布尔 / null
pub type ParameterSet = serde_json::Map<String, Value>;

/// 插件调用描述：参数原样传给插件，不做模板渲染
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginCall {
    pub plugin_id: String,
    pub params: ParameterSet,
}

/// 单个可执行条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutableItem {
    /// 已渲染的 shell 命令
    Shell { command: String },
    Plugin(PluginCall),
}

impl std::fmt::Display for ExecutableItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutableItem::Shell { command } => write!(f, "{}", command),
            ExecutableItem::Plugin(call) => {
                write!(f, "{} {}", call.plugin_id, Value::Object(call.params.clone()))
            }
        }
    }
}

/// 参数值转为字符串：字符串原样，null 为空串，其余用 JSON 字面量
pub fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
