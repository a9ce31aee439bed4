//! In-process trace recording for task runs.
//!
//! The [`Recorder`] implements the core `TraceSink` seam: the step loop
//! hands it a copy of every LLM call and tool execution span, and the
//! gateway queries it for per-task traces and summaries. Recording is
//! best-effort: a poisoned lock is logged and the span dropped, never
//! propagated into the task.

mod recorder;

pub use recorder::{Recorder, TaskTrace, TraceSummary};
