//! 动作构建：ActionSpec + 参数 -> 可执行条目列表
//!
//! shell 模板用 `{{ name }}` 占位符（两侧空格可选）；引用了参数表里没有的名字即 TemplateError。
//! 代入的值一律按 shell 单词引用，参数只能成为一个参数，不能拼出新命令；null 代入为空。
//! 插件规格不渲染，直接携带原始参数。

use regex::{Captures, Regex};
use serde_json::Value;

use crate::actions::{param_to_string, ExecutableItem, ParameterSet, PluginCall};
use crate::core::AgentError;
use crate::intents::ActionSpec;

/// 动作构建器：持有编译好的占位符正则
#[derive(Debug, Clone)]
pub struct ActionBuilder {
    placeholder: Regex,
}

impl Default for ActionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionBuilder {
    pub fn new() -> Self {
        Self {
            placeholder: Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
                .expect("placeholder pattern is valid"),
        }
    }

    pub fn build(
        &self,
        spec: &ActionSpec,
        params: &ParameterSet,
    ) -> Result<Vec<ExecutableItem>, AgentError> {
        match spec {
            ActionSpec::Shell { template_lines } => template_lines
                .iter()
                .map(|tpl| {
                    self.render(tpl, params)
                        .map(|command| ExecutableItem::Shell { command })
                })
                .collect(),
            ActionSpec::Plugin { plugin_id } => Ok(vec![ExecutableItem::Plugin(PluginCall {
                plugin_id: plugin_id.clone(),
                params: params.clone(),
            })]),
        }
    }

    /// 渲染单行模板；缺失参数报 TemplateError（列出第一个缺失名）
    pub fn render(&self, template: &str, params: &ParameterSet) -> Result<String, AgentError> {
        if let Some(missing) = self
            .placeholder
            .captures_iter(template)
            .map(|c| c[1].to_string())
            .find(|name| !params.contains_key(name))
        {
            return Err(AgentError::TemplateError(format!(
                "parameter '{}' is not provided for template `{}`",
                missing, template
            )));
        }
        Ok(self
            .placeholder
            .replace_all(template, |caps: &Captures| {
                match params.get(&caps[1]) {
                    None | Some(Value::Null) => String::new(),
                    Some(value) => shell_words::quote(&param_to_string(value)).into_owned(),
                }
            })
            .into_owned())
    }
}
