//! Oracle 回复解析：严格校验为 {thought, intent, params, stop, report}
//!
//! 整段回复必须是一个 JSON 对象（允许整体包在 ```json 围栏里）；尾随文字、非对象、字段类型错误、
//! 参数值为嵌套对象或数组都视为 OracleError，不做猜测性修复。

use serde::Deserialize;
use serde_json::Value;

use crate::actions::ParameterSet;
use crate::core::AgentError;

/// 校验后的单步决策
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OracleDecision {
    pub thought: String,
    /// None 表示本步不执行动作
    pub intent: Option<String>,
    pub params: ParameterSet,
    pub stop: bool,
    pub report: String,
}

#[derive(Deserialize)]
struct RawDecision {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    params: Option<ParameterSet>,
    #[serde(default)]
    stop: Option<bool>,
    #[serde(default)]
    report: Option<String>,
}

/// 去掉整体包裹的 Markdown 代码围栏
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => text,
    }
}

pub fn parse_decision(output: &str) -> Result<OracleDecision, AgentError> {
    let body = strip_fence(output.trim());
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AgentError::OracleError(format!("response is not valid JSON ({}): {}", e, body)))?;
    if !value.is_object() {
        return Err(AgentError::OracleError(format!(
            "response is not a JSON object: {}",
            body
        )));
    }
    let raw: RawDecision = serde_json::from_value(value)
        .map_err(|e| AgentError::OracleError(format!("malformed decision: {}", e)))?;

    let params = raw.params.unwrap_or_default();
    if let Some((name, _)) = params
        .iter()
        .find(|(_, v)| v.is_object() || v.is_array())
    {
        return Err(AgentError::OracleError(format!(
            "parameter '{}' must be a string, number or boolean",
            name
        )));
    }

    Ok(OracleDecision {
        thought: raw.thought.unwrap_or_default(),
        intent: raw
            .intent
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty()),
        params,
        stop: raw.stop.unwrap_or(false),
        report: raw.report.unwrap_or_default(),
    })
}
