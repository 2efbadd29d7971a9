//! 符号上下文：last_file / last_folder 等键值提示
//!
//! 保持首次插入顺序，覆盖写不改变位置；值为路径时展开 `~` 与环境变量。会话结束即丢弃。

/// 按插入顺序保存的键值存储，无淘汰
#[derive(Clone, Debug, Default)]
pub struct SymbolicContext {
    entries: Vec<(String, String)>,
}

impl SymbolicContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入（静默覆盖），值经路径规范化
    pub fn set(&mut self, key: impl Into<String>, value: &str) {
        let key = key.into();
        let value = normalize_path(value);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prompt 片段："Context:\n- key: value"；为空时返回空串
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("- {}: {}", k, v))
            .collect();
        format!("Context:\n{}", lines.join("\n"))
    }
}

/// 展开 `~` 与 `$VAR`；展开失败（未定义变量）时只展开 `~`
pub fn normalize_path(value: &str) -> String {
    match shellexpand::full(value) {
        Ok(expanded) => expanded.into_owned(),
        Err(_) => shellexpand::tilde(value).into_owned(),
    }
}
