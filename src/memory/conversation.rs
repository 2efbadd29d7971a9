//! 短期记忆：滚动对话日志
//!
//! 保留最近 N 条文本（用户输入、步骤摘要、观察输出），超出时淘汰最旧的一条。
//! Message / Role 为发给 LLM 的消息格式。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 有界 FIFO 对话日志
#[derive(Clone, Debug)]
pub struct ConversationLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ConversationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加一条；已满时先淘汰最旧的
    pub fn push(&mut self, entry: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// 全部条目按时间顺序以换行拼接；为空时返回空串
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_entry_evicted_first() {
        let mut log = ConversationLog::new(3);
        for i in 0..5 {
            log.push(format!("entry {}", i));
        }
        assert_eq!(log.len(), 3);
        let kept: Vec<&str> = log.entries().collect();
        assert_eq!(kept, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_text_joins_in_order() {
        let mut log = ConversationLog::new(20);
        assert_eq!(log.text(), "");
        log.push("a");
        log.push("b");
        assert_eq!(log.text(), "a\nb");
    }
}
