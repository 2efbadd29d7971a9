//! 意图注册表
//!
//! 启动时从目录加载全部 `*.toml` 声明文件，按文件名排序合并为 name -> ActionSpec；
//! 同名意图后加载者覆盖（不报错）。构建后只读，可用 Arc 在多个规划会话间共享。

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::AgentError;

/// 意图背后的具体动作：shell 模板列表或插件引用，二者恰有其一
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    Shell { template_lines: Vec<String> },
    Plugin { plugin_id: String },
}

/// 声明文件中单个意图的原始形态：{ shell = [...] } 或 { plugin = "files.create_file" }
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    #[serde(default)]
    shell: Option<Vec<String>>,
    #[serde(default)]
    plugin: Option<String>,
}

impl RawSpec {
    fn into_spec(self, intent: &str) -> Result<ActionSpec, AgentError> {
        match (self.shell, self.plugin) {
            (Some(lines), None) => Ok(ActionSpec::Shell {
                template_lines: lines,
            }),
            (None, Some(id)) => Ok(ActionSpec::Plugin { plugin_id: id }),
            (Some(_), Some(_)) => Err(AgentError::ConfigError(format!(
                "intent '{}' declares both shell and plugin",
                intent
            ))),
            (None, None) => Err(AgentError::ConfigError(format!(
                "intent '{}' declares neither shell nor plugin",
                intent
            ))),
        }
    }
}

/// 意图名 -> ActionSpec 的不可变映射
#[derive(Debug, Clone, Default)]
pub struct IntentRegistry {
    specs: HashMap<String, ActionSpec>,
}

impl IntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从目录加载（文件名排序，后者覆盖前者）
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, AgentError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            AgentError::ConfigError(format!("intents dir {}: {}", dir.display(), e))
        })?;
        let mut files: Vec<_> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map(|x| x == "toml").unwrap_or(false))
            .collect();
        files.sort();

        let mut registry = Self::new();
        for path in &files {
            let content = std::fs::read_to_string(path).map_err(|e| {
                AgentError::ConfigError(format!("read {}: {}", path.display(), e))
            })?;
            let count = registry.merge_toml(&content).map_err(|e| match e {
                AgentError::ConfigError(msg) => {
                    AgentError::ConfigError(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?;
            tracing::debug!(file = %path.display(), intents = count, "intent document merged");
        }
        tracing::info!("Loaded {} intents from {} files", registry.len(), files.len());
        Ok(registry)
    }

    /// 合并一个 TOML 文档；返回该文档声明的意图数
    pub fn merge_toml(&mut self, content: &str) -> Result<usize, AgentError> {
        let raw: HashMap<String, RawSpec> =
            toml::from_str(content).map_err(|e| AgentError::ConfigError(e.to_string()))?;
        let count = raw.len();
        for (name, spec) in raw {
            let spec = spec.into_spec(&name)?;
            self.specs.insert(name, spec);
        }
        Ok(count)
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: ActionSpec) {
        self.specs.insert(name.into(), spec);
    }

    pub fn resolve(&self, name: &str) -> Result<&ActionSpec, AgentError> {
        self.specs
            .get(name)
            .ok_or_else(|| AgentError::UnknownIntent(name.to_string()))
    }

    pub fn intent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
