//! Thread-safe span recorder, queryable per task.

use chrono::{DateTime, Utc};
use openmanus_core::trace::{SpanKind, TraceSink, TraceSpan};
use serde::Serialize;
use std::sync::RwLock;
use tracing::warn;

/// All spans recorded for one task run (most recent span last).
#[derive(Debug, Clone, Serialize)]
pub struct TaskTrace {
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub spans: Vec<TraceSpan>,
}

/// Aggregated view of one task's trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    pub task_id: String,
    pub llm_calls: usize,
    pub tool_executions: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TaskTrace {
    fn summary(&self) -> TraceSummary {
        let mut llm_calls = 0;
        let mut tool_executions = 0;
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;
        let mut total_duration_ms = 0u64;

        for span in &self.spans {
            match span.kind {
                SpanKind::LlmCall => llm_calls += 1,
                SpanKind::ToolExecution => tool_executions += 1,
                SpanKind::Task => {}
            }
            input_tokens += span.input_tokens.unwrap_or(0) as u64;
            output_tokens += span.output_tokens.unwrap_or(0) as u64;
            if span.kind != SpanKind::Task {
                total_duration_ms += span.duration_ms.unwrap_or(0);
            }
        }

        TraceSummary {
            task_id: self.task_id.clone(),
            llm_calls,
            tool_executions,
            input_tokens,
            output_tokens,
            total_duration_ms,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Collects spans per task, bounded to the most recent runs.
///
/// Thread-safe via `RwLock`. Every sink method swallows lock poisoning:
/// the observability sidecar must never take a task down with it.
pub struct Recorder {
    traces: RwLock<Vec<TaskTrace>>,
    max_traces: usize,
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Keep at most `max_traces` task traces, evicting the oldest.
    pub fn with_capacity(max_traces: usize) -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
            max_traces,
        }
    }

    /// The full trace for a task, if recorded.
    pub fn trace(&self, task_id: &str) -> Option<TaskTrace> {
        match self.traces.read() {
            Ok(traces) => traces.iter().find(|t| t.task_id == task_id).cloned(),
            Err(e) => {
                warn!("Trace store lock poisoned on read: {e}");
                None
            }
        }
    }

    /// Aggregated summary for a task, if recorded.
    pub fn summary(&self, task_id: &str) -> Option<TraceSummary> {
        self.trace(task_id).map(|t| t.summary())
    }

    /// Summaries for all retained task traces (oldest first).
    pub fn summaries(&self) -> Vec<TraceSummary> {
        match self.traces.read() {
            Ok(traces) => traces.iter().map(TaskTrace::summary).collect(),
            Err(e) => {
                warn!("Trace store lock poisoned on read: {e}");
                Vec::new()
            }
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceSink for Recorder {
    fn begin_trace(&self, task_id: &str) {
        let Ok(mut traces) = self.traces.write() else {
            warn!("Trace store lock poisoned, dropping begin_trace");
            return;
        };
        if traces.iter().any(|t| t.task_id == task_id) {
            return;
        }
        if traces.len() >= self.max_traces {
            traces.remove(0);
        }
        traces.push(TaskTrace {
            task_id: task_id.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            spans: Vec::new(),
        });
    }

    fn record(&self, task_id: &str, span: TraceSpan) {
        let Ok(mut traces) = self.traces.write() else {
            warn!("Trace store lock poisoned, dropping span");
            return;
        };
        if let Some(trace) = traces.iter_mut().find(|t| t.task_id == task_id) {
            trace.spans.push(span);
        }
    }

    fn end_trace(&self, task_id: &str) {
        let Ok(mut traces) = self.traces.write() else {
            warn!("Trace store lock poisoned, dropping end_trace");
            return;
        };
        if let Some(trace) = traces.iter_mut().find(|t| t.task_id == task_id) {
            trace.ended_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_span(input: u32, output: u32) -> TraceSpan {
        TraceSpan::new(SpanKind::LlmCall, "gpt-4o")
            .with_tokens(input, output)
            .finished(200, true)
    }

    fn tool_span(name: &str) -> TraceSpan {
        TraceSpan::new(SpanKind::ToolExecution, name).finished(50, true)
    }

    #[test]
    fn records_spans_per_task() {
        let recorder = Recorder::new();
        recorder.begin_trace("t1");
        recorder.record("t1", llm_span(100, 20));
        recorder.record("t1", tool_span("web_search"));
        recorder.end_trace("t1");

        let trace = recorder.trace("t1").unwrap();
        assert_eq!(trace.spans.len(), 2);
        assert!(trace.ended_at.is_some());
    }

    #[test]
    fn summary_aggregates_tokens_and_counts() {
        let recorder = Recorder::new();
        recorder.begin_trace("t1");
        recorder.record("t1", llm_span(100, 20));
        recorder.record("t1", llm_span(150, 30));
        recorder.record("t1", tool_span("shell"));
        recorder.end_trace("t1");

        let summary = recorder.summary("t1").unwrap();
        assert_eq!(summary.llm_calls, 2);
        assert_eq!(summary.tool_executions, 1);
        assert_eq!(summary.input_tokens, 250);
        assert_eq!(summary.output_tokens, 50);
        assert_eq!(summary.total_duration_ms, 450);
    }

    #[test]
    fn spans_for_unknown_task_are_dropped() {
        let recorder = Recorder::new();
        recorder.record("ghost", tool_span("shell"));
        assert!(recorder.trace("ghost").is_none());
    }

    #[test]
    fn capacity_evicts_oldest_trace() {
        let recorder = Recorder::with_capacity(2);
        recorder.begin_trace("t1");
        recorder.begin_trace("t2");
        recorder.begin_trace("t3");

        assert!(recorder.trace("t1").is_none());
        assert!(recorder.trace("t2").is_some());
        assert!(recorder.trace("t3").is_some());
        assert_eq!(recorder.summaries().len(), 2);
    }

    #[test]
    fn duplicate_begin_is_idempotent() {
        let recorder = Recorder::new();
        recorder.begin_trace("t1");
        recorder.record("t1", tool_span("shell"));
        recorder.begin_trace("t1");

        assert_eq!(recorder.trace("t1").unwrap().spans.len(), 1);
    }

    #[test]
    fn trace_serializes_to_json() {
        let recorder = Recorder::new();
        recorder.begin_trace("t1");
        recorder.record("t1", llm_span(10, 5));

        let json = serde_json::to_string(&recorder.trace("t1").unwrap()).unwrap();
        assert!(json.contains("llm_call"));
        assert!(json.contains("t1"));
    }
}
