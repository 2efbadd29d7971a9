//! 自主规划主循环
//!
//! Plan -> 护栏 -> Act -> Observe -> 记忆 -> 下一轮 Plan；步数受 max_steps 限制。
//! LLM 不可信且无状态：每步都用记忆重建上下文，护栏在必要时否决它的决定。
//! `run` 永不返回错误也不 panic，所有终止原因都体现在 PlannerReport 的 LoopStatus 中。

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::actions::{ActionBuilder, ActionExecutor, Observation, ParameterSet};
use crate::config::PlannerSection;
use crate::core::{AgentError, GuardKind, LoopStatus};
use crate::intents::IntentRegistry;
use crate::llm::LlmClient;
use crate::memory::{normalize_path, Memory, Message};
use crate::planner::guards::{judge_stop, ActionKey, GoalHeuristics, StopVerdict};
use crate::planner::prompt::{compose_prompt, truncate_chars, PromptParts, SYSTEM_PROMPT};
use crate::planner::{parse_decision, OracleDecision, PlannerEvent, PlannerState};

/// Oracle 默认超时
const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 120;
/// 事件中观察预览的最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 一次规划会话的最终结果
#[derive(Debug)]
pub struct PlannerReport {
    pub session_id: String,
    pub state: PlannerState,
    pub memory: Memory,
    /// LLM 最后一次给出的非空 report
    pub report: String,
}

impl PlannerReport {
    pub fn status(&self) -> &LoopStatus {
        &self.state.status
    }
}

/// Planner：持有 LLM、意图表、执行器与配置；可反复 run，每次 run 都是全新会话
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    registry: Arc<IntentRegistry>,
    executor: Arc<ActionExecutor>,
    builder: ActionBuilder,
    options: PlannerSection,
    heuristics: GoalHeuristics,
    oracle_timeout: Duration,
    event_tx: Option<UnboundedSender<PlannerEvent>>,
}

impl Planner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<IntentRegistry>,
        executor: Arc<ActionExecutor>,
        options: PlannerSection,
    ) -> Self {
        let heuristics = GoalHeuristics::from_config(&options);
        Self {
            llm,
            registry,
            executor,
            builder: ActionBuilder::new(),
            options,
            heuristics,
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            event_tx: None,
        }
    }

    /// 覆盖白名单
    pub fn with_allowed_intents<I, S>(mut self, intents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.allowed_intents = intents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.options.max_steps = max_steps;
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<PlannerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub async fn run(&self, goal: &str) -> PlannerReport {
        self.run_with_cancel(goal, CancellationToken::new()).await
    }

    /// 执行规划循环；cancel 在下一次 LLM 调用或下一次动作分发前生效
    pub async fn run_with_cancel(&self, goal: &str, cancel: CancellationToken) -> PlannerReport {
        let session_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("planner", session = %session_id);
        let mut session = Session::new(self, goal);
        session.drive(&cancel).instrument(span).await;
        PlannerReport {
            session_id,
            state: session.state,
            memory: session.memory,
            report: session.report,
        }
    }

    fn emit(&self, event: PlannerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

/// 单次会话：状态与记忆只属于这一次 run
struct Session<'a> {
    planner: &'a Planner,
    goal: &'a str,
    state: PlannerState,
    memory: Memory,
    report: String,
}

impl<'a> Session<'a> {
    fn new(planner: &'a Planner, goal: &'a str) -> Self {
        let opts = &planner.options;
        let allowed: BTreeSet<String> = opts.allowed_intents.iter().cloned().collect();
        Self {
            planner,
            goal,
            state: PlannerState::new(opts.max_steps, allowed),
            memory: Memory::new(opts.memory_capacity),
            report: String::new(),
        }
    }

    async fn drive(&mut self, cancel: &CancellationToken) {
        tracing::info!(goal = %self.goal, allowed = ?self.state.allowed_list(), "[PLANNER] goal");

        while self.state.step < self.state.max_steps {
            self.state.step += 1;
            let status = self.step(cancel).await;
            if status.is_terminal() {
                self.state.status = status;
                break;
            }
        }
        if !self.state.status.is_terminal() {
            tracing::info!(steps = self.state.step, "[PLANNER] step budget exhausted");
            self.state.status = LoopStatus::StoppedByMaxSteps;
        }

        tracing::info!(status = %self.state.status, steps = self.state.step, "[PLANNER] loop finished");
        self.planner.emit(PlannerEvent::Finished {
            status: self.state.status.to_string(),
            steps: self.state.step,
        });
    }

    /// 执行一步；返回 Running 表示继续
    async fn step(&mut self, cancel: &CancellationToken) -> LoopStatus {
        let planner = self.planner;
        let opts = &planner.options;
        let step = self.state.step;
        planner.emit(PlannerEvent::StepStarted {
            step,
            max_steps: self.state.max_steps,
        });

        if cancel.is_cancelled() {
            tracing::warn!(step, "[PLANNER] cancelled before oracle call");
            return LoopStatus::Cancelled;
        }

        let prompt = self.compose_prompt();
        let decision = match self.ask(&prompt, cancel).await {
            Ok(d) => d,
            Err(AgentError::Cancelled) => {
                tracing::warn!(step, "[PLANNER] cancelled during oracle call");
                return LoopStatus::Cancelled;
            }
            Err(e) => {
                tracing::warn!(step, "[PLANNER] oracle failure: {}", e);
                return LoopStatus::StoppedByOracleError(e.to_string());
            }
        };

        tracing::info!(step, thought = %decision.thought, "[STEP] thought");
        if !decision.report.is_empty() {
            self.report = decision.report.clone();
        }
        planner.emit(PlannerEvent::Thought {
            step,
            thought: decision.thought.clone(),
            report: decision.report.clone(),
        });

        let OracleDecision {
            intent,
            mut params,
            stop,
            report,
            ..
        } = decision;
        let mut intent = intent;

        // 重复读取：强制改为写入类意图，且本步不允许停止
        let mut suppress_stop = false;
        if let Some(current) = intent.as_deref() {
            if opts.read_only_intents.iter().any(|i| i == current)
                && self.state.seen_actions.contains_intent(current)
            {
                let detail = format!(
                    "repeated {} detected; forcing {}",
                    current, opts.mutate_intent
                );
                tracing::warn!(step, "[GUARD] {}", detail);
                planner.emit(PlannerEvent::Guard { step, detail });
                intent = Some(opts.mutate_intent.clone());
                suppress_stop = true;
            }
        }

        // 过早停止：目标要求的创建/编辑尚未执行时否决 stop
        let mut stop_overridden = false;
        if stop && !suppress_stop {
            match judge_stop(self.goal, &planner.heuristics, &self.state.seen_actions, opts) {
                StopVerdict::Honor => {
                    tracing::info!(step, report = %report, "[STEP] stop=true");
                    self.memory.record(format!("MIA: stopped - {}", report));
                    return LoopStatus::StoppedByModel;
                }
                verdict => {
                    let detail = match verdict {
                        StopVerdict::ContinueNeedsEdit => {
                            "goal requires editing but no edit/write action executed yet; continuing"
                        }
                        _ => "goal requires creating but no create/write action executed yet; continuing",
                    };
                    tracing::warn!(step, "[GUARD] {}", detail);
                    planner.emit(PlannerEvent::Guard {
                        step,
                        detail: detail.to_string(),
                    });
                    stop_overridden = true;
                }
            }
        }

        let Some(intent) = intent else {
            if stop_overridden {
                // 否决了 stop 但没有可执行的动作：空转一步，把否决原因作为观察反馈
                self.memory
                    .record(format!("GUARD: stop rejected at step {}; goal not yet satisfied", step));
                self.state.last_observation = Observation::failure(
                    "stop rejected: the goal still requires a create/edit action that has not been executed",
                );
                return LoopStatus::Running;
            }
            tracing::warn!(step, "[STEP] no intent given. Stopping.");
            return LoopStatus::StoppedByDisallowedIntent("(none)".to_string());
        };

        if !self.state.is_allowed(&intent) {
            tracing::warn!(step, intent = %intent, "[STEP] intent not allowed. Stopping.");
            return LoopStatus::StoppedByDisallowedIntent(intent);
        }

        self.normalize_params(&mut params);

        if cancel.is_cancelled() {
            tracing::warn!(step, "[PLANNER] cancelled before dispatch");
            return LoopStatus::Cancelled;
        }

        let key = ActionKey::new(&intent, &params);
        if self.state.seen_actions.succeeded(&key) {
            let detail = format!("{} with identical params already succeeded; not running it again", intent);
            tracing::warn!(step, "[GUARD] {}", detail);
            planner.emit(PlannerEvent::Guard { step, detail });
            return LoopStatus::StoppedByGuard(GuardKind::RepeatedSuccess);
        }

        let spec = match planner.registry.resolve(&intent) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(step, "[STEP] {}", e);
                return LoopStatus::StoppedByUnknownIntent(intent);
            }
        };

        let params_json = Value::Object(params.clone());
        tracing::info!(step, intent = %intent, params = %params_json, "[STEP] action");
        planner.emit(PlannerEvent::Action {
            step,
            intent: intent.clone(),
            params: params_json,
        });

        let observation = match planner.builder.build(spec, &params) {
            Ok(items) => {
                for item in &items {
                    tracing::debug!(step, "   -> {}", item);
                }
                planner.executor.run_with_cancel(&items, cancel).await
            }
            Err(e) => {
                tracing::warn!(step, "[STEP] could not build action: {}", e);
                Observation::failure(e.to_string())
            }
        };
        tracing::info!(step, status = observation.status_code, "[STEP] result");

        self.state.seen_actions.record(key, observation.status_code);
        self.remember(&intent, &params, &observation);
        planner.emit(PlannerEvent::Observation {
            step,
            status_code: observation.status_code,
            preview: truncate_chars(observation.display_text(), OBSERVATION_PREVIEW_CHARS)
                .to_string(),
        });

        let repeated_failure = self
            .state
            .seen_actions
            .repeated_failure(observation.status_code);
        let status_code = observation.status_code;
        self.state.last_observation = observation;
        if repeated_failure {
            let detail = format!(
                "status {} returned by more than one distinct action; stopping",
                status_code
            );
            tracing::warn!(step, "[GUARD] {}", detail);
            planner.emit(PlannerEvent::Guard { step, detail });
            return LoopStatus::StoppedByGuard(GuardKind::RepeatedFailure);
        }

        LoopStatus::Running
    }

    fn compose_prompt(&self) -> String {
        let opts = &self.planner.options;
        let allowed = self.state.allowed_list();
        let symbolic = self.memory.symbolic().summary();
        let history = self.memory.recent_history(opts.history_lines);
        let observation = truncate_chars(
            self.state.last_observation.display_text(),
            opts.observation_chars,
        );
        compose_prompt(&PromptParts {
            allowed: &allowed,
            symbolic: &symbolic,
            history: history.as_deref(),
            observation,
            goal: self.goal,
        })
    }

    /// 调用 LLM 并严格解析；超时与取消都在这里处理
    async fn ask(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<OracleDecision, AgentError> {
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
        let call = tokio::time::timeout(
            self.planner.oracle_timeout,
            self.planner.llm.complete(&messages),
        );
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            res = call => match res {
                Err(_) => {
                    return Err(AgentError::OracleError(format!(
                        "timed out after {:?}",
                        self.planner.oracle_timeout
                    )))
                }
                Ok(Err(e)) => return Err(AgentError::OracleError(e)),
                Ok(Ok(text)) => text,
            },
        };
        parse_decision(&output)
    }

    /// 路径参数：`./x` 在已有 last_folder 时改写为其下路径，再展开 `~` 与环境变量
    fn normalize_params(&self, params: &mut ParameterSet) {
        let last_folder = self.memory.get_context("last_folder").map(str::to_string);
        for (name, value) in params.iter_mut() {
            if !is_path_param(name) {
                continue;
            }
            let Value::String(raw) = value else {
                continue;
            };
            let mut path = raw.clone();
            if let (Some(rest), Some(folder)) = (raw.strip_prefix("./"), last_folder.as_deref()) {
                path = Path::new(folder).join(rest).to_string_lossy().into_owned();
            }
            let normalized = normalize_path(&path);
            if normalized != *raw {
                tracing::debug!(param = %name, from = %raw, to = %normalized, "path normalized");
                *value = Value::String(normalized);
            }
        }
    }

    /// 步骤摘要与输出写入对话记忆；成功时更新 last_folder / last_file
    fn remember(&mut self, intent: &str, params: &ParameterSet, obs: &Observation) {
        let opts = &self.planner.options;
        self.memory.record(format!(
            "MIA: ran {} params={} -> code={}",
            intent,
            Value::Object(params.clone()),
            obs.status_code
        ));
        if !obs.stdout.is_empty() {
            self.memory.record(format!(
                "OBS: {}",
                truncate_chars(&obs.stdout, opts.memory_entry_chars)
            ));
        }
        if !obs.stderr.is_empty() {
            self.memory.record(format!(
                "ERR: {}",
                truncate_chars(&obs.stderr, opts.memory_entry_chars)
            ));
        }

        if !obs.is_success() {
            return;
        }
        let Some(Value::String(path)) = params.get("path") else {
            return;
        };
        if opts.folder_intents.iter().any(|i| i == intent) {
            self.memory.set_context("last_folder", path);
        }
        if opts.file_intents.iter().any(|i| i == intent) {
            self.memory.set_context("last_file", path);
        }
    }
}

fn is_path_param(name: &str) -> bool {
    name == "path" || name.ends_with("_path")
}
