//! 重试包装：在 Oracle 层对失败请求做有限次重试（指数退避）
//!
//! Planner 自身从不重试；需要重试的调用方用 RetryingLlmClient 包一层。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::Message;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;
        loop {
            match self.inner.complete(messages).await {
                Ok(content) => return Ok(content),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, "LLM request failed, retrying: {}", e);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
