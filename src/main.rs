//! Mia 命令行入口：初始化日志、加载配置与意图表、组装 Planner 并运行一个目标

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use mia::actions::{ActionExecutor, StdinApprover};
use mia::config::load_config;
use mia::intents::IntentRegistry;
use mia::llm::create_llm_from_config;
use mia::plugins::PluginRegistry;
use mia::{AgentError, Planner};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mia", version, about = "Natural-language automation assistant")]
struct Cli {
    /// 要达成的目标（自然语言）
    #[arg(required = true, num_args = 1..)]
    goal: Vec<String>,

    /// 覆盖允许的意图（可多次给出，或逗号分隔）
    #[arg(long = "allow", value_delimiter = ',')]
    allow: Vec<String>,

    /// 最大步数
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    steps: Option<u32>,

    /// 每条 shell 命令执行前交互确认
    #[arg(long)]
    confirm: bool,

    /// 额外的配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 意图声明目录
    #[arg(long)]
    intents: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;

    let intents_dir = cli.intents.clone().unwrap_or_else(|| cfg.app.intents_dir.clone());
    let registry = IntentRegistry::load_dir(&intents_dir)
        .with_context(|| format!("Failed to load intents from {}", intents_dir.display()))?;
    tracing::info!(count = registry.len(), dir = %intents_dir.display(), "intents loaded");

    let mut executor =
        ActionExecutor::new(PluginRegistry::with_builtins(), cfg.executor.shell_timeout_secs);
    if cli.confirm || cfg.executor.confirm {
        executor = executor.with_approver(Arc::new(StdinApprover));
    }

    let llm = create_llm_from_config(&cfg.llm);
    let mut planner = Planner::new(llm, Arc::new(registry), Arc::new(executor), cfg.planner.clone())
        .with_oracle_timeout(Duration::from_secs(cfg.llm.request_timeout_secs));
    if !cli.allow.is_empty() {
        planner = planner.with_allowed_intents(cli.allow.iter().map(|s| s.trim().to_string()));
    }
    if let Some(steps) = cli.steps {
        planner = planner.with_max_steps(steps as usize);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping after the current step");
            ctrl_c.cancel();
        }
    });

    let goal = cli.goal.join(" ");
    let report = planner.run_with_cancel(&goal, cancel).await;

    println!("status: {}", report.status());
    println!("steps:  {}", report.state.step);
    if !report.report.is_empty() {
        println!("report: {}", report.report);
    }

    if let Some(err) = report.status().error() {
        tracing::warn!("planner stopped: {}", err);
        if matches!(err, AgentError::OracleError(_)) {
            return Err(err).context("oracle failure");
        }
    }
    Ok(())
}
