//! 记忆层：滚动对话日志 + 符号上下文
//!
//! Memory 只属于一次规划会话：由 Planner 创建、修改，会话结束即销毁，不跨会话共享。

pub mod conversation;
pub mod symbolic;

pub use conversation::{ConversationLog, Message, Role};
pub use symbolic::{normalize_path, SymbolicContext};

/// 会话记忆：对话日志（有界）与符号上下文（无淘汰）
#[derive(Clone, Debug)]
pub struct Memory {
    log: ConversationLog,
    context: SymbolicContext,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: ConversationLog::new(capacity),
            context: SymbolicContext::new(),
        }
    }

    pub fn record(&mut self, entry: impl Into<String>) {
        self.log.push(entry);
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: &str) {
        self.context.set(key, value);
    }

    pub fn get_context(&self, key: &str) -> Option<&str> {
        self.context.get(key)
    }

    pub fn get_context_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.context.get(key).unwrap_or(default)
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn symbolic(&self) -> &SymbolicContext {
        &self.context
    }

    /// 最近 max_lines 行历史；无历史时返回 None
    pub fn recent_history(&self, max_lines: usize) -> Option<String> {
        let text = self.log.text();
        if text.is_empty() {
            return None;
        }
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        Some(lines[start..].join("\n"))
    }

    /// 符号上下文摘要 + 最近对话；两者皆空时返回空串
    pub fn render_prompt(&self) -> String {
        let mut parts = Vec::new();
        if !self.context.is_empty() {
            parts.push(self.context.summary());
        }
        if !self.log.is_empty() {
            parts.push(format!("\nRecent conversation:\n{}", self.log.text()));
        }
        parts.join("\n").trim().to_string()
    }
}
