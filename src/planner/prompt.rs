//! Planner Prompt：system 指令与每步的 user prompt 拼装
//!
//! 每步 prompt 包含：允许的意图、符号上下文、最近历史、上一步观察（截断）与原始目标。

use std::sync::OnceLock;

use regex::{Captures, Regex};

static SECTION_RE: OnceLock<Regex> = OnceLock::new();

/// system 指令：要求 LLM 只输出一个 JSON 对象
pub const SYSTEM_PROMPT: &str = r#"You translate a user's goal into exactly one structured action.
Respond with a single JSON object and nothing else: no Markdown, no code fences, no commentary.
The object has the keys "thought" (string), "intent" (string or null), "params" (object of
string/number/boolean values), "stop" (boolean) and "report" (string)."#;

const PLANNER_TEMPLATE: &str = r#"You are MIA's autonomous planner. You have to achieve the user's GOAL by deciding ONE next action
(intents are predefined). Think step-by-step but OUTPUT ONLY JSON with this schema:

{
  "thought": "brief reasoning for the next action",
  "intent": "one_of_allowed_intents_or_null",
  "params": { ... },
  "stop": false,
  "report": "1-2 sentence status update for the user"
}

Rules:
- Choose only from ALLOWED_INTENTS (listed below).
- Only set "stop": true after the last required action has been executed successfully.
- If you still need to modify or verify something, first output the correct intent (e.g. edit_file or write_file) before stopping.
- Never stop immediately after reading; if you've read a file to inspect code, the next step must be an edit or write action.
- Do not repeat read_file unless the file changed.
- Keep params minimal and accurate (expand "~" paths logically; use context when user says "in it").
- Never invent an intent.
- When you describe that something is created, you must also issue the actual action (e.g. create_file or write_file).
- If you cannot proceed safely, set "stop": true and explain in "report".

ALLOWED_INTENTS:
{allowed}

CONTEXT (symbolic):
{symbolic}

RECENT MESSAGES:
{history}

LAST OBSERVATION:
{observation}

GOAL:
{goal}
"#;

/// 组成一步 prompt 所需的各段文本（已按需截断）
#[derive(Debug, Clone)]
pub struct PromptParts<'a> {
    pub allowed: &'a [String],
    pub symbolic: &'a str,
    pub history: Option<&'a str>,
    pub observation: &'a str,
    pub goal: &'a str,
}

pub fn compose_prompt(parts: &PromptParts<'_>) -> String {
    let symbolic = if parts.symbolic.is_empty() {
        "(none)"
    } else {
        parts.symbolic
    };
    let history = parts.history.filter(|h| !h.is_empty()).unwrap_or("(none)");
    let allowed = parts.allowed.join(", ");
    // 单遍替换：已代入的文本（文件内容、历史）不会再被扫描
    let re = SECTION_RE.get_or_init(|| {
        Regex::new(r"\{(allowed|symbolic|history|observation|goal)\}").expect("section pattern is valid")
    });
    re.replace_all(PLANNER_TEMPLATE, |caps: &Captures| match &caps[1] {
        "allowed" => allowed.as_str(),
        "symbolic" => symbolic,
        "history" => history,
        "observation" => parts.observation,
        _ => parts.goal,
    })
    .into_owned()
}

/// 按字符（非字节）截断
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
