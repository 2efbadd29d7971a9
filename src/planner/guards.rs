//! 安全护栏：已执行动作记录与基于目标文本的关键词判定
//!
//! - 重复成功：同一 (intent, 排序后参数) 已成功过，执行前拦截
//! - 重复失败：同一非零状态码出现在多于一个不同动作上，执行后终止
//! - 重复读取：只读意图再次出现时强制改为写入类意图
//! - 过早停止：目标文本要求创建/编辑而尚未执行过对应动作时，否决 stop=true

use serde::Serialize;

use crate::actions::{param_to_string, ParameterSet};
use crate::config::PlannerSection;

/// 动作指纹：意图名 + 按键排序的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionKey {
    pub intent: String,
    pub params: Vec<(String, String)>,
}

impl ActionKey {
    pub fn new(intent: &str, params: &ParameterSet) -> Self {
        let mut items: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.clone(), param_to_string(v)))
            .collect();
        items.sort();
        Self {
            intent: intent.to_string(),
            params: items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeenAction {
    pub key: ActionKey,
    pub status_code: i32,
}

/// 本会话已执行的动作（按执行顺序），每个新目标重新开始
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeenActions {
    entries: Vec<SeenAction>,
}

impl SeenActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: ActionKey, status_code: i32) {
        self.entries.push(SeenAction { key, status_code });
    }

    pub fn entries(&self) -> &[SeenAction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_intent(&self, intent: &str) -> bool {
        self.entries.iter().any(|a| a.key.intent == intent)
    }

    pub fn contains_any_intent(&self, intents: &[String]) -> bool {
        self.entries
            .iter()
            .any(|a| intents.iter().any(|i| *i == a.key.intent))
    }

    /// 该指纹是否已成功执行过
    pub fn succeeded(&self, key: &ActionKey) -> bool {
        self.entries
            .iter()
            .any(|a| a.status_code == 0 && a.key == *key)
    }

    /// 以该状态码结束的不同动作个数
    pub fn distinct_with_status(&self, status_code: i32) -> usize {
        let mut distinct: Vec<&ActionKey> = Vec::new();
        for a in self.entries.iter().filter(|a| a.status_code == status_code) {
            if !distinct.contains(&&a.key) {
                distinct.push(&a.key);
            }
        }
        distinct.len()
    }

    /// 重复失败护栏：非零且多于一个不同动作共享该状态码
    pub fn repeated_failure(&self, status_code: i32) -> bool {
        status_code != 0 && self.distinct_with_status(status_code) > 1
    }
}

/// 目标文本关键词判定（小写子串匹配）
#[derive(Debug, Clone)]
pub struct GoalHeuristics {
    create_keywords: Vec<String>,
    edit_keywords: Vec<String>,
}

impl GoalHeuristics {
    pub fn from_config(cfg: &PlannerSection) -> Self {
        Self {
            create_keywords: cfg.create_keywords.iter().map(|k| k.to_lowercase()).collect(),
            edit_keywords: cfg.edit_keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn needs_create(&self, goal: &str) -> bool {
        let g = goal.to_lowercase();
        self.create_keywords.iter().any(|k| g.contains(k.as_str()))
    }

    pub fn needs_edit(&self, goal: &str) -> bool {
        let g = goal.to_lowercase();
        self.edit_keywords.iter().any(|k| g.contains(k.as_str()))
    }
}

/// 过早停止判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopVerdict {
    Honor,
    /// 目标要求编辑但尚未编辑
    ContinueNeedsEdit,
    /// 目标要求创建但尚未创建
    ContinueNeedsCreate,
}

pub fn judge_stop(
    goal: &str,
    heuristics: &GoalHeuristics,
    seen: &SeenActions,
    cfg: &PlannerSection,
) -> StopVerdict {
    if heuristics.needs_edit(goal) && !seen.contains_any_intent(&cfg.edit_intents) {
        StopVerdict::ContinueNeedsEdit
    } else if heuristics.needs_create(goal) && !seen.contains_any_intent(&cfg.create_intents) {
        StopVerdict::ContinueNeedsCreate
    } else {
        StopVerdict::Honor
    }
}
