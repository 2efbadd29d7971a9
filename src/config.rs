//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MIA__*` 覆盖（双下划线表示嵌套，如 `MIA__LLM__PROVIDER=ollama`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub executor: ExecutorSection,
}

/// [app] 段：意图声明目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_intents_dir")]
    pub intents_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            intents_dir: default_intents_dir(),
        }
    }
}

fn default_intents_dir() -> PathBuf {
    PathBuf::from("config/intents")
}

/// [llm] 段：后端选择、模型、超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：auto / openai / ollama / mock；auto 时有 OPENAI_API_KEY 走 OpenAI，否则走 Ollama
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// 单次 LLM 请求超时（秒），超时按 Oracle 失败处理
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Oracle 层自动重试次数（Planner 本身不重试）
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            ollama_model: default_ollama_model(),
            ollama_url: default_ollama_url(),
            request_timeout_secs: default_request_timeout(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_provider() -> String {
    "auto".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434/api/chat".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_retry_backoff_ms() -> u64 {
    500
}

/// [planner] 段：步数、记忆容量、白名单与护栏用到的意图分类和关键词
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// 滚动对话记忆条数上限
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// Prompt 中保留的最近历史行数
    #[serde(default = "default_history_lines")]
    pub history_lines: usize,
    /// Prompt 中上一步 Observation 的最大字符数
    #[serde(default = "default_observation_chars")]
    pub observation_chars: usize,
    /// 写入记忆的单条输出/错误最大字符数
    #[serde(default = "default_memory_entry_chars")]
    pub memory_entry_chars: usize,
    #[serde(default = "default_allowed_intents")]
    pub allowed_intents: Vec<String>,
    /// 只读观察类意图（重复读取会被强制改为 mutate_intent）
    #[serde(default = "default_read_only_intents")]
    pub read_only_intents: Vec<String>,
    #[serde(default = "default_mutate_intent")]
    pub mutate_intent: String,
    /// 计为「已创建」的意图
    #[serde(default = "default_create_intents")]
    pub create_intents: Vec<String>,
    /// 计为「已编辑」的意图
    #[serde(default = "default_edit_intents")]
    pub edit_intents: Vec<String>,
    /// 成功后写入 last_folder 的意图
    #[serde(default = "default_folder_intents")]
    pub folder_intents: Vec<String>,
    /// 成功后写入 last_file 的意图
    #[serde(default = "default_file_intents")]
    pub file_intents: Vec<String>,
    #[serde(default = "default_create_keywords")]
    pub create_keywords: Vec<String>,
    #[serde(default = "default_edit_keywords")]
    pub edit_keywords: Vec<String>,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            memory_capacity: default_memory_capacity(),
            history_lines: default_history_lines(),
            observation_chars: default_observation_chars(),
            memory_entry_chars: default_memory_entry_chars(),
            allowed_intents: default_allowed_intents(),
            read_only_intents: default_read_only_intents(),
            mutate_intent: default_mutate_intent(),
            create_intents: default_create_intents(),
            edit_intents: default_edit_intents(),
            folder_intents: default_folder_intents(),
            file_intents: default_file_intents(),
            create_keywords: default_create_keywords(),
            edit_keywords: default_edit_keywords(),
        }
    }
}

fn default_max_steps() -> usize {
    20
}

fn default_memory_capacity() -> usize {
    20
}

fn default_history_lines() -> usize {
    12
}

fn default_observation_chars() -> usize {
    2000
}

fn default_memory_entry_chars() -> usize {
    500
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_allowed_intents() -> Vec<String> {
    strings(&[
        "create_folder",
        "list_home",
        "list_dir",
        "create_file",
        "write_file",
        "edit_file",
        "read_file",
        "file_exists",
        "ping_host",
    ])
}

fn default_read_only_intents() -> Vec<String> {
    strings(&["read_file"])
}

fn default_mutate_intent() -> String {
    "edit_file".to_string()
}

fn default_create_intents() -> Vec<String> {
    strings(&["create_file", "write_file", "edit_file", "create_folder"])
}

fn default_edit_intents() -> Vec<String> {
    strings(&["edit_file", "write_file"])
}

fn default_folder_intents() -> Vec<String> {
    strings(&["create_folder"])
}

fn default_file_intents() -> Vec<String> {
    strings(&["create_file", "write_file", "edit_file", "read_file", "file_exists"])
}

fn default_create_keywords() -> Vec<String> {
    strings(&[
        "create",
        "make",
        "write a file",
        "write file",
        "put a file",
        "add a file",
        "new folder",
        "new directory",
        "create folder",
    ])
}

fn default_edit_keywords() -> Vec<String> {
    strings(&["edit", "modify", "change", "convert", "update", "refactor"])
}

/// [executor] 段：确认模式与 shell 超时
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// 为 true 时每条 shell 命令执行前需交互确认
    #[serde(default)]
    pub confirm: bool,
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            confirm: false,
            shell_timeout_secs: default_shell_timeout_secs(),
        }
    }
}

fn default_shell_timeout_secs() -> u64 {
    30
}

/// 从 config 目录加载配置，环境变量 MIA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MIA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MIA")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("planner.allowed_intents"),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.planner.max_steps, 20);
        assert_eq!(cfg.planner.memory_capacity, 20);
        assert_eq!(cfg.planner.observation_chars, 2000);
        assert!(cfg.planner.allowed_intents.contains(&"create_folder".to_string()));
        assert_eq!(cfg.planner.mutate_intent, "edit_file");
        assert!(!cfg.executor.confirm);
        assert_eq!(cfg.llm.provider, "auto");
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[planner]\nmax_steps = 5\nallowed_intents = [\"read_file\"]\n\n[executor]\nconfirm = true\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.planner.max_steps, 5);
        assert_eq!(cfg.planner.allowed_intents, vec!["read_file".to_string()]);
        assert!(cfg.executor.confirm);
        // 未写的键保持默认
        assert_eq!(cfg.planner.history_lines, 12);
    }
}
