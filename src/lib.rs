//! Mia - 自然语言驱动的自动化助手
//!
//! 模块划分：
//! - **actions**: 动作构建（模板渲染）、执行（shell / 插件）与执行前确认
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与循环终止状态
//! - **intents**: 意图声明表（config/intents/*.toml）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）及重试
//! - **memory**: 滚动对话记忆与符号上下文
//! - **planner**: 自主规划循环与安全护栏
//! - **plugins**: 插件抽象与内置文件插件

pub mod actions;
pub mod config;
pub mod core;
pub mod intents;
pub mod llm;
pub mod memory;
pub mod planner;
pub mod plugins;

pub use crate::core::{AgentError, GuardKind, LoopStatus};
pub use planner::{Planner, PlannerReport};
