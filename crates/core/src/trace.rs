//! Observability seam — the trace sink.
//!
//! The step loop copies every LLM call and tool execution into an injected
//! [`TraceSink`]. The sink is optional and best-effort: implementations must
//! be infallible at the call site (log-and-drop internally), and the default
//! is a no-op. No process-wide singletons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of work a trace span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// An LLM completion call.
    LlmCall,
    /// A tool execution.
    ToolExecution,
    /// Top-level task run (prompt → terminal status).
    Task,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LlmCall => write!(f, "llm_call"),
            Self::ToolExecution => write!(f, "tool_execution"),
            Self::Task => write!(f, "task"),
        }
    }
}

/// A single traced execution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    /// Unique identifier.
    pub id: String,
    /// What kind of work this represents.
    pub kind: SpanKind,
    /// Human-readable label (tool name, model name).
    pub label: String,
    /// When the span started.
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Input tokens consumed (LLM calls).
    pub input_tokens: Option<u32>,
    /// Output tokens produced (LLM calls).
    pub output_tokens: Option<u32>,
    /// Whether the operation succeeded.
    pub success: bool,
}

impl TraceSpan {
    /// Create a new span with the given kind and label.
    pub fn new(kind: SpanKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            started_at: Utc::now(),
            duration_ms: None,
            input_tokens: None,
            output_tokens: None,
            success: true,
        }
    }

    /// Record token usage.
    pub fn with_tokens(mut self, input: u32, output: u32) -> Self {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
        self
    }

    /// Record duration and success.
    pub fn finished(mut self, duration_ms: u64, success: bool) -> Self {
        self.duration_ms = Some(duration_ms);
        self.success = success;
        self
    }
}

/// Receives a copy of every span as tasks execute.
///
/// All methods are fire-and-forget: they take `&self`, return nothing, and
/// must never panic or block for long. A sink that fails internally must
/// swallow the failure.
pub trait TraceSink: Send + Sync {
    /// A new task trace begins.
    fn begin_trace(&self, task_id: &str);

    /// A span completed within the task's trace.
    fn record(&self, task_id: &str, span: TraceSpan);

    /// The task's trace is complete.
    fn end_trace(&self, task_id: &str);
}

/// The default sink: discards everything.
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn begin_trace(&self, _task_id: &str) {}
    fn record(&self, _task_id: &str, _span: TraceSpan) {}
    fn end_trace(&self, _task_id: &str) {}
}
