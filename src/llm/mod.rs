//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）及按配置选择后端

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod retry;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use mock::MockLlmClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingLlmClient};
pub use traits::LlmClient;

use crate::config::LlmSection;

/// 根据配置与环境变量选择 LLM 后端
///
/// provider = auto 时：有 OPENAI_API_KEY 用 OpenAI，否则用本地 Ollama；max_retries > 0 时外包一层重试。
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());

    let base: Arc<dyn LlmClient> = match provider.as_str() {
        "mock" => {
            tracing::warn!("Using Mock LLM backend");
            Arc::new(MockLlmClient::new())
        }
        "openai" => {
            tracing::info!("Using OpenAI LLM ({})", cfg.model);
            Arc::new(OpenAiClient::new(
                cfg.base_url.as_deref(),
                &cfg.model,
                api_key.as_deref(),
            ))
        }
        "auto" if api_key.is_some() => {
            tracing::info!("Using OpenAI LLM ({})", cfg.model);
            Arc::new(OpenAiClient::new(
                cfg.base_url.as_deref(),
                &cfg.model,
                api_key.as_deref(),
            ))
        }
        other => {
            if other != "ollama" && other != "auto" {
                tracing::warn!("Unknown LLM provider '{}', falling back to Ollama", other);
            }
            tracing::info!("Using Ollama LLM ({})", cfg.ollama_model);
            Arc::new(OllamaClient::new(&cfg.ollama_url, &cfg.ollama_model))
        }
    };

    if cfg.max_retries > 0 {
        Arc::new(RetryingLlmClient::new(
            base,
            RetryConfig {
                max_retries: cfg.max_retries,
                initial_backoff: Duration::from_millis(cfg.retry_backoff_ms),
            },
        ))
    } else {
        base
    }
}
