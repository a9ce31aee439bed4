//! The step-bounded task execution loop.
//!
//! Each step is think → act: the provider is asked for the next move with
//! the full message history and tool definitions, then any requested tool
//! calls are executed and their observations appended as tool messages.
//! The loop ends when the model calls `terminate`, the step budget runs
//! out, a stop request is observed, or the provider fails permanently.
//!
//! Tool failures never end the run: they come back to the model as error
//! text in a tool message so it can react. Only provider failures (after
//! the retry decorator has given up) mark the task failed.

use crate::prompt::{NEXT_STEP_PROMPT, STUCK_PROMPT, SYSTEM_PROMPT};
use crate::stuck::StuckDetector;
use openmanus_config::AppConfig;
use openmanus_core::event::{AgentEvent, EventBus};
use openmanus_core::message::Message;
use openmanus_core::provider::{Provider, ProviderRequest};
use openmanus_core::task::{RunOutcome, StepKind, StepRecord, Task, TaskStatus};
use openmanus_core::tool::{ToolCall, ToolRegistry};
use openmanus_core::trace::{NoopSink, SpanKind, TraceSink, TraceSpan};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Requests a cooperative stop of a running task.
///
/// Stopping is checked between steps: an in-flight LLM call or tool
/// execution finishes first, then the loop halts without appending
/// anything further.
#[derive(Clone)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.sender.send(true);
    }
}

/// The runner's view of the stop channel.
#[derive(Clone)]
pub struct StopSignal {
    receiver: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow()
    }

    /// A signal that never fires, for callers without a stop control.
    pub fn never() -> Self {
        stop_channel().1
    }
}

/// Create a connected stop handle/signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        StopHandle {
            sender: Arc::new(sender),
        },
        StopSignal { receiver },
    )
}

/// Drives one task from prompt to terminal status.
pub struct TaskRunner {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
    special_tools: Vec<String>,
    stuck_config: openmanus_config::StuckConfig,
    event_bus: Arc<EventBus>,
    trace: Arc<dyn TraceSink>,
}

impl TaskRunner {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        Self {
            provider,
            tools,
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            max_steps: config.agent.max_steps,
            special_tools: vec!["terminate".into()],
            stuck_config: config.stuck.clone(),
            event_bus: Arc::new(EventBus::default()),
            trace: Arc::new(NoopSink),
        }
    }

    /// Publish step and status events on a shared bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    /// Copy LLM and tool spans into a trace sink.
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = sink;
        self
    }

    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn is_special_tool(&self, name: &str) -> bool {
        self.special_tools.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    fn record(&self, task: &mut Task, record: StepRecord) {
        self.event_bus.publish(AgentEvent::Step {
            task_id: task.id.to_string(),
            record: record.clone(),
        });
        task.record(record);
    }

    fn set_status(&self, task: &mut Task, status: TaskStatus) {
        self.event_bus.publish(AgentEvent::StatusChanged {
            task_id: task.id.to_string(),
            status,
        });
    }

    /// Run the task to a terminal status. The task is mutated in place;
    /// the returned outcome is richer than the final status (it tells a
    /// budget-exhausted finish apart from a terminate call).
    pub async fn run(&self, task: &mut Task, stop: StopSignal) -> RunOutcome {
        let task_id = task.id.to_string();
        let task_start = Instant::now();

        task.status = TaskStatus::Running;
        self.set_status(task, TaskStatus::Running);
        self.trace.begin_trace(&task_id);

        let mut detector = StuckDetector::from_config(&self.stuck_config);
        let mut nudge: Option<&str> = None;
        let tool_defs = self.tools.definitions();
        let mut step = 0u32;

        info!(task_id = %task_id, model = %self.model, max_steps = self.max_steps, "Task run starting");

        let outcome = loop {
            if stop.is_stopped() {
                warn!(task_id = %task_id, step, "Stop requested, halting run");
                self.record(task, StepRecord::new(step, StepKind::Log, "Stop requested, run halted"));
                break RunOutcome::Stopped;
            }

            if step >= self.max_steps {
                let note = format!("Terminated: Reached max steps ({})", self.max_steps);
                warn!(task_id = %task_id, "{note}");
                self.record(task, StepRecord::new(step, StepKind::Log, &note));
                break RunOutcome::StepBudgetExhausted;
            }

            step += 1;
            debug!(task_id = %task_id, step, max = self.max_steps, "Executing step");

            // ── Think ──
            let next_prompt = match nudge.take() {
                Some(n) => format!("{n}\n{NEXT_STEP_PROMPT}"),
                None => NEXT_STEP_PROMPT.to_string(),
            };
            task.push(Message::user(next_prompt));

            let mut messages = vec![Message::system(SYSTEM_PROMPT)];
            messages.extend(task.messages.iter().cloned());

            let request = ProviderRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_defs.clone(),
            };

            let llm_start = Instant::now();
            let response = match self.provider.complete(request).await {
                Ok(r) => r,
                Err(e) => {
                    self.trace.record(
                        &task_id,
                        TraceSpan::new(SpanKind::LlmCall, &self.model)
                            .finished(llm_start.elapsed().as_millis() as u64, false),
                    );
                    let text = format!("LLM call failed: {e}");
                    self.record(task, StepRecord::new(step, StepKind::Error, &text));
                    break RunOutcome::Failed(e.to_string());
                }
            };

            let mut llm_span = TraceSpan::new(SpanKind::LlmCall, &response.model);
            if let Some(usage) = &response.usage {
                llm_span = llm_span.with_tokens(usage.prompt_tokens, usage.completion_tokens);
            }
            self.trace.record(
                &task_id,
                llm_span.finished(llm_start.elapsed().as_millis() as u64, true),
            );

            let assistant = response.message;
            if !assistant.content.is_empty() {
                self.record(
                    task,
                    StepRecord::new(step, StepKind::Think, &assistant.content),
                );
            }
            for tc in &assistant.tool_calls {
                let args = serde_json::from_str(&tc.arguments).ok();
                self.record(
                    task,
                    StepRecord::new(step, StepKind::Tool, "").with_tool(&tc.name, args),
                );
            }

            let tool_calls = assistant.tool_calls.clone();
            let stuck = detector.observe(&assistant.content);
            task.push(assistant);

            if stuck {
                warn!(task_id = %task_id, step, "Repeated responses detected, nudging");
                nudge = Some(STUCK_PROMPT);
                self.record(
                    task,
                    StepRecord::new(
                        step,
                        StepKind::Log,
                        "Detected repeated responses; steering toward a new strategy",
                    ),
                );
            }

            if tool_calls.is_empty() {
                // Pure thought: the step is consumed, the loop continues.
                continue;
            }

            // ── Act ──
            let mut finished = false;
            for tc in &tool_calls {
                let arguments = parse_arguments(&tc.arguments);
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };

                let tool_start = Instant::now();
                let result = self.tools.execute(&call).await;
                let duration_ms = tool_start.elapsed().as_millis() as u64;

                match result {
                    Ok(tool_result) => {
                        self.trace.record(
                            &task_id,
                            TraceSpan::new(SpanKind::ToolExecution, &tc.name)
                                .finished(duration_ms, tool_result.success),
                        );
                        self.record(
                            task,
                            StepRecord::new(step, StepKind::Act, &tool_result.output)
                                .with_tool(&tc.name, None),
                        );
                        task.push(Message::tool_result(&tc.id, &tc.name, &tool_result.output));

                        if tool_result.success && self.is_special_tool(&tc.name) {
                            info!(task_id = %task_id, tool = %tc.name, "Special tool completed the task");
                            finished = true;
                        }
                    }
                    Err(e) => {
                        self.trace.record(
                            &task_id,
                            TraceSpan::new(SpanKind::ToolExecution, &tc.name)
                                .finished(duration_ms, false),
                        );
                        let error_text = format!("Error: {e}");
                        warn!(task_id = %task_id, tool = %tc.name, "{error_text}");
                        self.record(
                            task,
                            StepRecord::new(step, StepKind::Error, &error_text)
                                .with_tool(&tc.name, None),
                        );
                        task.push(Message::tool_result(&tc.id, &tc.name, &error_text));
                    }
                }
            }

            if finished {
                break RunOutcome::Finished;
            }
        };

        // ── Finalize ──
        let result = match &outcome {
            RunOutcome::Finished => Some(
                last_assistant_text(task).unwrap_or_else(|| "Task completed.".to_string()),
            ),
            RunOutcome::StepBudgetExhausted => Some(format!(
                "Terminated: Reached max steps ({})",
                self.max_steps
            )),
            RunOutcome::Stopped | RunOutcome::Failed(_) => None,
        };

        match &outcome {
            RunOutcome::Finished | RunOutcome::StepBudgetExhausted => {
                let text = result.clone().unwrap_or_default();
                self.record(task, StepRecord::new(step, StepKind::Complete, text));
            }
            RunOutcome::Stopped | RunOutcome::Failed(_) => {}
        }

        task.finish(&outcome, result);
        self.set_status(task, task.status);

        self.trace.record(
            &task_id,
            TraceSpan::new(SpanKind::Task, &task.prompt).finished(
                task_start.elapsed().as_millis() as u64,
                !matches!(outcome, RunOutcome::Failed(_)),
            ),
        );
        self.trace.end_trace(&task_id);

        info!(task_id = %task_id, status = ?task.status, steps = step, "Task run finished");
        outcome
    }
}

/// Parse the raw argument string from a tool call.
///
/// Models occasionally emit invalid JSON; rather than dropping the call, the
/// raw text is wrapped so the schema validator can reject it with a message
/// the model sees.
fn parse_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({ "raw_input": raw }))
}

fn last_assistant_text(task: &Task) -> Option<String> {
    task.messages
        .iter()
        .rev()
        .find(|m| m.role == openmanus_core::message::Role::Assistant && !m.content.is_empty())
        .map(|m| m.content.clone())
}
