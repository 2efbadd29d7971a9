//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按顺序返回预置的回复；脚本耗尽后返回 stop=true。同时记录收到的每一次请求，便于断言 Prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::Message;

const EXHAUSTED_REPLY: &str =
    r#"{"thought": "nothing scripted", "intent": null, "params": {}, "stop": true, "report": "mock backend has no further actions"}"#;

/// 脚本化回复；Err 条目模拟后端故障
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for r in replies {
            client.push_reply(r);
        }
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut s) = self.script.lock() {
            s.push_back(Ok(reply.into()));
        }
    }

    pub fn push_failure(&self, error: impl Into<String>) {
        if let Ok(mut s) = self.script.lock() {
            s.push_back(Err(error.into()));
        }
    }

    /// 已收到的请求（每次为完整消息列表）
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(EXHAUSTED_REPLY.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_stop() {
        let client = MockLlmClient::with_replies(["first", "second"]);
        client.push_failure("backend down");
        let msgs = [Message::user("goal")];
        assert_eq!(client.complete(&msgs).await.unwrap(), "first");
        assert_eq!(client.complete(&msgs).await.unwrap(), "second");
        assert_eq!(client.complete(&msgs).await.unwrap_err(), "backend down");
        assert!(client.complete(&msgs).await.unwrap().contains("\"stop\": true"));
        assert_eq!(client.requests().len(), 4);
    }
}
