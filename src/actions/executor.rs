//! 动作执行器
//!
//! 按顺序执行条目：shell 命令经 `sh -c` 启动并分别捕获 stdout/stderr；插件按 id 分发，
//! 其 Err 与 panic 都在这里转为 status_code = 1，绝不向上传播。
//! 汇总规则：最终状态码取最后一个实际执行的条目；各条输出去首尾空白后按执行顺序以换行拼接。
//! 每个条目输出一行结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::actions::{Approver, ExecutableItem, PluginCall};
use crate::core::AgentError;
use crate::plugins::{PluginOutput, PluginRegistry};

/// 一个规划步骤的执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Observation {
    pub fn new(status_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(1, "", stderr)
    }

    /// 执行失败统一走 ExecutionError，只进入观察，不终止循环
    pub fn from_error(err: AgentError) -> Self {
        Self::failure(err.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }

    /// 供 Prompt 使用：优先 stdout，其次 stderr，都为空时 "(none)"
    pub fn display_text(&self) -> &str {
        if !self.stdout.is_empty() {
            &self.stdout
        } else if !self.stderr.is_empty() {
            &self.stderr
        } else {
            "(none)"
        }
    }
}

/// 动作执行器：持有插件表、shell 超时与可选审批器
pub struct ActionExecutor {
    plugins: PluginRegistry,
    shell_timeout: Duration,
    approver: Option<Arc<dyn Approver>>,
}

impl ActionExecutor {
    pub fn new(plugins: PluginRegistry, shell_timeout_secs: u64) -> Self {
        Self {
            plugins,
            shell_timeout: Duration::from_secs(shell_timeout_secs),
            approver: None,
        }
    }

    /// 开启确认模式：每条 shell 命令执行前询问
    pub fn with_approver(mut self, approver: Arc<dyn Approver>) -> Self {
        self.approver = Some(approver);
        self
    }

    pub async fn run(&self, items: &[ExecutableItem]) -> Observation {
        self.run_with_cancel(items, &CancellationToken::new()).await
    }

    /// 取消后剩余条目（包括等待确认中的条目）都不再执行
    pub async fn run_with_cancel(
        &self,
        items: &[ExecutableItem],
        cancel: &CancellationToken,
    ) -> Observation {
        let mut out_parts: Vec<String> = Vec::new();
        let mut err_parts: Vec<String> = Vec::new();
        let mut code_final = 0;

        for item in items {
            if cancel.is_cancelled() {
                tracing::warn!(item = %item, "cancelled; remaining actions skipped");
                break;
            }
            let start = Instant::now();
            let (kind, obs) = match item {
                ExecutableItem::Shell { command } => {
                    if !self.approved(command, cancel).await {
                        tracing::info!(command = %command, "shell action skipped");
                        continue;
                    }
                    ("shell", self.run_shell(command).await)
                }
                ExecutableItem::Plugin(call) => ("plugin", self.run_plugin(call).await),
            };

            let audit = serde_json::json!({
                "event": "action_audit",
                "kind": kind,
                "item": item.to_string(),
                "status": obs.status_code,
                "duration_ms": start.elapsed().as_millis() as u64,
            });
            tracing::info!(audit = %audit.to_string(), "action");

            let stdout = obs.stdout.trim();
            if !stdout.is_empty() {
                out_parts.push(stdout.to_string());
            }
            let stderr = obs.stderr.trim();
            if !stderr.is_empty() {
                tracing::warn!(kind, "action error: {}", stderr);
                err_parts.push(stderr.to_string());
            }
            code_final = obs.status_code;
        }

        Observation::new(code_final, out_parts.join("\n"), err_parts.join("\n"))
    }

    /// 确认模式下在阻塞线程上询问；等待期间收到取消视为拒绝
    async fn approved(&self, command: &str, cancel: &CancellationToken) -> bool {
        let Some(approver) = self.approver.clone() else {
            return true;
        };
        let command = command.to_string();
        let ask = tokio::task::spawn_blocking(move || approver.approve(&command));
        tokio::select! {
            _ = cancel.cancelled() => false,
            answer = ask => answer.unwrap_or(false) && !cancel.is_cancelled(),
        }
    }

    async fn run_shell(&self, command: &str) -> Observation {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        match tokio::time::timeout(self.shell_timeout, cmd.output()).await {
            Err(_) => Observation::failure(format!(
                "Command timed out after {}s",
                self.shell_timeout.as_secs()
            )),
            Ok(Err(e)) => Observation::from_error(AgentError::ExecutionError(e.to_string())),
            Ok(Ok(output)) => Observation::new(
                // 被信号终止时没有退出码
                output.status.code().unwrap_or(1),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ),
        }
    }

    async fn run_plugin(&self, call: &PluginCall) -> Observation {
        let Some(plugin) = self.plugins.get(&call.plugin_id) else {
            return Observation::from_error(AgentError::ExecutionError(format!(
                "Unknown plugin: {}",
                call.plugin_id
            )));
        };
        tracing::info!(plugin = %call.plugin_id, "plugin call");

        let mut out = PluginOutput::new();
        let result = AssertUnwindSafe(plugin.call(&call.params, &mut out))
            .catch_unwind()
            .await;
        let stdout = out.into_string();
        match result {
            Ok(Ok(code)) => Observation::new(code, stdout, ""),
            Ok(Err(e)) => Observation::new(
                1,
                stdout,
                format!("{} plugin error: {}\n{:?}", call.plugin_id, e, e),
            ),
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Observation::new(1, stdout, format!("{} panicked: {}", call.plugin_id, msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ParameterSet;
    use crate::plugins::{Plugin, PluginError};
    use async_trait::async_trait;

    struct PanickingPlugin;

    #[async_trait]
    impl Plugin for PanickingPlugin {
        fn id(&self) -> &str {
            "test.panic"
        }

        async fn call(&self, _params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
            out.println("before panic");
            panic!("boom");
        }
    }

    struct FailingPlugin;

    #[async_trait]
    impl Plugin for FailingPlugin {
        fn id(&self) -> &str {
            "test.fail"
        }

        async fn call(&self, _params: &ParameterSet, _out: &mut PluginOutput) -> Result<i32, PluginError> {
            Err(PluginError::Other("disk on fire".to_string()))
        }
    }

    struct Deny;

    impl Approver for Deny {
        fn approve(&self, _command: &str) -> bool {
            false
        }
    }

    /// 回答 y，但回答前用户已按下 Ctrl-C
    struct ApproveAfterCancel(CancellationToken);

    impl Approver for ApproveAfterCancel {
        fn approve(&self, _command: &str) -> bool {
            self.0.cancel();
            true
        }
    }

    fn shell(cmd: &str) -> ExecutableItem {
        ExecutableItem::Shell {
            command: cmd.to_string(),
        }
    }

    fn plugin(id: &str) -> ExecutableItem {
        ExecutableItem::Plugin(PluginCall {
            plugin_id: id.to_string(),
            params: ParameterSet::new(),
        })
    }

    #[tokio::test]
    async fn test_last_status_wins_and_output_concatenated() {
        let executor = ActionExecutor::new(PluginRegistry::new(), 10);
        let obs = executor
            .run(&[shell("echo A"), shell("echo B; exit 2")])
            .await;
        assert_eq!(obs.status_code, 2);
        assert_eq!(obs.stdout, "A\nB");
    }

    #[tokio::test]
    async fn test_failure_then_success_reports_success() {
        let executor = ActionExecutor::new(PluginRegistry::new(), 10);
        let obs = executor
            .run(&[shell("echo oops >&2; exit 3"), shell("echo fine")])
            .await;
        assert_eq!(obs.status_code, 0);
        assert_eq!(obs.stdout, "fine");
        assert_eq!(obs.stderr, "oops");
    }

    #[tokio::test]
    async fn test_plugin_panic_is_contained() {
        let mut plugins = PluginRegistry::new();
        plugins.register(PanickingPlugin);
        let executor = ActionExecutor::new(plugins, 10);
        let obs = executor.run(&[plugin("test.panic")]).await;
        assert_eq!(obs.status_code, 1);
        assert_eq!(obs.stdout, "before panic");
        assert!(obs.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_plugin_error_and_unknown_plugin() {
        let mut plugins = PluginRegistry::new();
        plugins.register(FailingPlugin);
        let executor = ActionExecutor::new(plugins, 10);

        let obs = executor.run(&[plugin("test.fail")]).await;
        assert_eq!(obs.status_code, 1);
        assert!(obs.stderr.contains("disk on fire"));

        let obs = executor.run(&[plugin("test.missing")]).await;
        assert_eq!(obs.status_code, 1);
        assert!(obs.stderr.starts_with("Execution failed: Unknown plugin"));
    }

    #[tokio::test]
    async fn test_declined_item_skipped_and_status_preserved() {
        let executor = ActionExecutor::new(PluginRegistry::new(), 10).with_approver(Arc::new(Deny));
        let obs = executor.run(&[shell("echo never")]).await;
        assert_eq!(obs, Observation::default());
    }

    #[tokio::test]
    async fn test_cancelled_run_executes_nothing() {
        let executor = ActionExecutor::new(PluginRegistry::new(), 10);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let obs = executor
            .run_with_cancel(&[shell("echo never")], &cancel)
            .await;
        assert_eq!(obs, Observation::default());
    }

    #[tokio::test]
    async fn test_approval_after_cancel_is_ignored() {
        let cancel = CancellationToken::new();
        let executor = ActionExecutor::new(PluginRegistry::new(), 10)
            .with_approver(Arc::new(ApproveAfterCancel(cancel.clone())));
        let obs = executor
            .run_with_cancel(&[shell("echo never"), shell("echo also never")], &cancel)
            .await;
        assert!(obs.stdout.is_empty());
        assert_eq!(obs.status_code, 0);
    }

    #[tokio::test]
    async fn test_shell_timeout() {
        let executor = ActionExecutor::new(PluginRegistry::new(), 1);
        let obs = executor.run(&[shell("sleep 5")]).await;
        assert_eq!(obs.status_code, 1);
        assert!(obs.stderr.contains("timed out"));
    }
}
