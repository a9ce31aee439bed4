//! Task and step-record domain types.
//!
//! A task is one user prompt's end-to-end agent run: an ordered, append-only
//! message history plus a step log for replay. Tasks reach exactly one
//! terminal status and are never mutated afterwards.

use crate::message::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created but not yet picked up by a runner
    Pending,
    /// The step loop is executing
    Running,
    /// Terminal: finished normally (including step-budget exhaustion)
    Completed,
    /// Terminal: an unrecoverable error (e.g. provider retries exhausted)
    Failed,
    /// Terminal: a user stop request was observed
    Stopped,
}

impl TaskStatus {
    /// Whether this status is terminal — the task will not mutate again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

/// How a run of the step loop ended.
///
/// Richer than [`TaskStatus`]: the presentation layer can distinguish a
/// budget-exhausted run from a normal finish even though both map to
/// `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The agent signalled completion (terminate tool or final text answer).
    Finished,
    /// The configured step budget ran out before completion.
    StepBudgetExhausted,
    /// A stop request was observed between steps.
    Stopped,
    /// The run failed; the message holds the error text.
    Failed(String),
}

impl RunOutcome {
    /// The terminal task status this outcome maps to.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Finished | Self::StepBudgetExhausted => TaskStatus::Completed,
            Self::Stopped => TaskStatus::Stopped,
            Self::Failed(_) => TaskStatus::Failed,
        }
    }
}

/// The kind of work one step record represents.
///
/// These are the event kinds the presentation layer renders:
/// `think` / `tool` / `act` / `log` / `complete` / `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Assistant reasoning text
    Think,
    /// A tool was selected with arguments
    Tool,
    /// A tool produced a result (observation)
    Act,
    /// Informational log line
    Log,
    /// Terminal: task completed
    Complete,
    /// Terminal: task errored
    Error,
}

/// One entry in a task's step log — used for UI replay and tracing only.
/// Control decisions read the message history, not the step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based step-loop index this record belongs to
    pub step: u32,

    /// What kind of record this is
    pub kind: StepKind,

    /// Emitted text (thought, observation, log line, result, error)
    pub content: String,

    /// Selected tool name, for `Tool` and `Act` records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Tool arguments as JSON, for `Tool` records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<serde_json::Value>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(step: u32, kind: StepKind, content: impl Into<String>) -> Self {
        Self {
            step,
            kind,
            content: content.into(),
            tool_name: None,
            tool_args: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>, args: Option<serde_json::Value>) -> Self {
        self.tool_name = Some(name.into());
        self.tool_args = args;
        self
    }
}

/// One user prompt's end-to-end agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// The originating user prompt
    pub prompt: String,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Ordered, append-only message history
    pub messages: Vec<Message>,

    /// Step log for replay and tracing
    pub steps: Vec<StepRecord>,

    /// Final result text (set on completion)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Error text (set on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When this task was created
    pub created_at: DateTime<Utc>,

    /// When this task reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task for the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            id: TaskId::new(),
            prompt: prompt.clone(),
            status: TaskStatus::Pending,
            messages: vec![Message::user(prompt)],
            steps: Vec::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append a message. Panics in debug builds if the task is terminal —
    /// terminal tasks are immutable by contract.
    pub fn push(&mut self, message: Message) {
        debug_assert!(!self.status.is_terminal(), "message pushed to terminal task");
        self.messages.push(message);
    }

    /// Append a step record.
    pub fn record(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    /// Move the task into a terminal state according to the run outcome.
    pub fn finish(&mut self, outcome: &RunOutcome, result: Option<String>) {
        self.status = outcome.status();
        self.finished_at = Some(Utc::now());
        match outcome {
            RunOutcome::Failed(err) => self.error = Some(err.clone()),
            _ => self.result = result,
        }
    }

    /// Rebuild the think/tool/act step sequence from the message history.
    ///
    /// This is the replay path the presentation layer uses to reconstruct a
    /// finished task's timeline from its serialized messages. Terminal
    /// `Complete`/`Error` records are lifecycle markers, not derivable from
    /// messages, so they are not reproduced here.
    pub fn replay_steps(messages: &[Message]) -> Vec<StepRecord> {
        let mut records = Vec::new();
        let mut step = 0u32;

        for msg in messages {
            match msg.role {
                Role::Assistant => {
                    step += 1;
                    if !msg.content.is_empty() {
                        records.push(StepRecord::new(step, StepKind::Think, &msg.content));
                    }
                    for tc in &msg.tool_calls {
                        let args = serde_json::from_str(&tc.arguments).ok();
                        records.push(
                            StepRecord::new(step, StepKind::Tool, "")
                                .with_tool(&tc.name, args),
                        );
                    }
                }
                Role::Tool => {
                    let name = msg.tool_name.clone().unwrap_or_default();
                    records.push(
                        StepRecord::new(step, StepKind::Act, &msg.content)
                            .with_tool(name, None),
                    );
                }
                Role::User | Role::System => {}
            }
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageToolCall;

    #[test]
    fn new_task_starts_pending_with_prompt_message() {
        let task = Task::new("summarize the news");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.messages.len(), 1);
        assert_eq!(task.messages[0].role, Role::User);
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn outcome_status_mapping() {
        assert_eq!(RunOutcome::Finished.status(), TaskStatus::Completed);
        assert_eq!(
            RunOutcome::StepBudgetExhausted.status(),
            TaskStatus::Completed
        );
        assert_eq!(RunOutcome::Stopped.status(), TaskStatus::Stopped);
        assert_eq!(
            RunOutcome::Failed("boom".into()).status(),
            TaskStatus::Failed
        );
    }

    #[test]
    fn finish_sets_terminal_fields() {
        let mut task = Task::new("x");
        task.finish(&RunOutcome::Finished, Some("done".into()));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("done"));
        assert!(task.finished_at.is_some());

        let mut failed = Task::new("y");
        failed.finish(&RunOutcome::Failed("provider gave up".into()), None);
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("provider gave up"));
    }

    #[test]
    fn replay_reconstructs_step_sequence() {
        let messages = vec![
            Message::user("find X"),
            Message::assistant_with_tool_calls(
                "I should search",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: "web_search".into(),
                    arguments: r#"{"query":"X"}"#.into(),
                }],
            ),
            Message::tool_result("call_1", "web_search", "3 results"),
            Message::assistant("X is a thing. Done."),
        ];

        let steps = Task::replay_steps(&messages);
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Think, StepKind::Tool, StepKind::Act, StepKind::Think]
        );
        assert_eq!(steps[1].tool_name.as_deref(), Some("web_search"));
        assert_eq!(steps[0].step, 1);
        assert_eq!(steps[3].step, 2);
    }

    #[test]
    fn replay_roundtrip_through_serialization() {
        let messages = vec![
            Message::user("prompt"),
            Message::assistant("thinking out loud"),
        ];
        let original = Task::replay_steps(&messages);

        let json = serde_json::to_string(&messages).unwrap();
        let restored: Vec<Message> = serde_json::from_str(&json).unwrap();
        let replayed = Task::replay_steps(&restored);

        assert_eq!(original.len(), replayed.len());
        for (a, b) in original.iter().zip(replayed.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.step, b.step);
            assert_eq!(a.content, b.content);
        }
    }
}
