//! 插件系统：按 `<module>.<function>` 形式的 id 静态注册
//!
//! 每个插件实现 Plugin trait，接收原始参数表（不做模板渲染），返回整数状态码（0 = 成功），
//! 诊断文字写入 PluginOutput，由执行器收集进 Observation。
//! 插件返回 Err 或 panic 都在执行器边界被捕获，不会中断规划循环。

pub mod files;

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::actions::ParameterSet;

/// 插件内部错误（执行器会转为 status_code = 1）
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("missing parameter: {0}")]
    MissingParam(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// 插件输出缓冲：相当于插件的标准输出
#[derive(Debug, Default, Clone)]
pub struct PluginOutput {
    buf: String,
}

impl PluginOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn println(&mut self, line: impl Display) {
        self.buf.push_str(&line.to_string());
        self.buf.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// 插件 trait：id 与异步调用
#[async_trait]
pub trait Plugin: Send + Sync {
    /// 注册 id，如 "files.create_file"
    fn id(&self) -> &str;

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput)
        -> Result<i32, PluginError>;
}

/// 插件注册表：id -> Arc<dyn Plugin>，启动时填充
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置插件（files.*）
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        files::register(&mut registry);
        registry
    }

    pub fn register(&mut self, plugin: impl Plugin + 'static) {
        self.register_arc(Arc::new(plugin));
    }

    pub fn register_arc(&mut self, plugin: Arc<dyn Plugin>) {
        let id = plugin.id().to_string();
        self.plugins.insert(id, plugin);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(id).cloned()
    }
}

/// 取必填字符串参数；数字 / 布尔按字面量转为字符串
pub(crate) fn required_str(params: &ParameterSet, name: &str) -> Result<String, PluginError> {
    optional_str(params, name)?.ok_or_else(|| PluginError::MissingParam(name.to_string()))
}

/// 取可选字符串参数；null 视为缺省
pub(crate) fn optional_str(params: &ParameterSet, name: &str) -> Result<Option<String>, PluginError> {
    use serde_json::Value;
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(PluginError::InvalidParam {
            name: name.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}
