//! End-to-end integration tests for the OpenManus agent runtime.
//!
//! These tests drive the full pipeline with a scripted provider: the real
//! tool registry, the real step loop, the event bus, and the trace
//! recorder, asserting on the task that comes out the other side.

use std::sync::Arc;

use openmanus_agent::{stop_channel, StopHandle, StopSignal, TaskRunner};
use openmanus_config::AppConfig;
use openmanus_core::event::{AgentEvent, EventBus};
use openmanus_core::error::ProviderError;
use openmanus_core::message::{Message, MessageToolCall, Role};
use openmanus_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use openmanus_core::task::{RunOutcome, StepKind, Task, TaskStatus};
use openmanus_providers::mock::{make_tool_call, SequentialMockProvider};
use openmanus_telemetry::Recorder;

fn response(text: &str, tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(text.to_string(), tool_calls),
        usage: Some(Usage {
            prompt_tokens: 20,
            completion_tokens: 10,
            total_tokens: 30,
        }),
        model: "mock-1".into(),
    }
}

fn terminate_call(id: &str) -> MessageToolCall {
    make_tool_call(id, "terminate", r#"{"status":"success"}"#)
}

fn runner_for(provider: SequentialMockProvider, config: &AppConfig) -> TaskRunner {
    let tools = Arc::new(openmanus_tools::default_registry(config).unwrap());
    TaskRunner::new(Arc::new(provider), tools, config)
}

#[tokio::test]
async fn search_synthesize_complete_pipeline() {
    // Step 1: the agent searches. Step 2: it synthesizes an answer citing
    // the results and terminates.
    let provider = SequentialMockProvider::new(vec![
        response(
            "I should look this up first.",
            vec![make_tool_call(
                "call_1",
                "web_search",
                r#"{"query":"rust async runtimes"}"#,
            )],
        ),
        response(
            "Based on the search results, Tokio is the most widely used async \
             runtime for Rust. See https://docs.rs/ for details.",
            vec![terminate_call("call_2")],
        ),
    ]);

    let config = AppConfig::default();
    let runner = runner_for(provider, &config);

    let mut task = Task::new("What async runtimes exist for Rust?");
    let outcome = runner.run(&mut task, StopSignal::never()).await;

    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(task.status, TaskStatus::Completed);

    // Exactly one search was observed.
    let search_acts: Vec<_> = task
        .steps
        .iter()
        .filter(|s| s.kind == StepKind::Act && s.tool_name.as_deref() == Some("web_search"))
        .collect();
    assert_eq!(search_acts.len(), 1);
    assert!(search_acts[0].content.contains("http"));

    // The final answer is the synthesis, not the tool output.
    let result = task.result.as_deref().unwrap();
    assert!(result.contains("Tokio"));
    assert!(result.contains("https://docs.rs/"));
}

#[tokio::test]
async fn file_save_writes_into_workspace() {
    let workspace = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.tools.workspace_dir = Some(workspace.path().to_string_lossy().into_owned());

    let provider = SequentialMockProvider::new(vec![
        response(
            "Writing the summary to disk.",
            vec![make_tool_call(
                "call_1",
                "file_save",
                r##"{"path":"summary.md","content":"# Findings\nAll good.\n"}"##,
            )],
        ),
        response("Saved the summary to summary.md.", vec![terminate_call("call_2")]),
    ]);

    let runner = runner_for(provider, &config);
    let mut task = Task::new("Save a summary file");
    let outcome = runner.run(&mut task, StopSignal::never()).await;

    assert_eq!(outcome, RunOutcome::Finished);
    let written = std::fs::read_to_string(workspace.path().join("summary.md")).unwrap();
    assert!(written.contains("All good."));
}

#[tokio::test]
async fn replayed_steps_match_recorded_steps() {
    let provider = SequentialMockProvider::new(vec![
        response(
            "Checking the workspace.",
            vec![make_tool_call("call_1", "shell", r#"{"command":"echo hi"}"#)],
        ),
        response("The workspace looks fine.", vec![terminate_call("call_2")]),
    ]);

    let config = AppConfig::default();
    let runner = runner_for(provider, &config);
    let mut task = Task::new("Inspect the workspace");
    runner.run(&mut task, StopSignal::never()).await;

    // Serialize, restore, and replay the message history. The replayed
    // think/tool/act sequence must line up with the recorded step log.
    let json = serde_json::to_string(&task.messages).unwrap();
    let restored: Vec<Message> = serde_json::from_str(&json).unwrap();
    let replayed = Task::replay_steps(&restored);

    let recorded: Vec<_> = task
        .steps
        .iter()
        .filter(|s| matches!(s.kind, StepKind::Think | StepKind::Tool | StepKind::Act))
        .collect();

    assert_eq!(replayed.len(), recorded.len());
    for (replay, record) in replayed.iter().zip(recorded.iter()) {
        assert_eq!(replay.kind, record.kind);
        assert_eq!(replay.step, record.step);
        assert_eq!(replay.tool_name, record.tool_name);
    }
}

#[tokio::test]
async fn events_and_trace_cover_the_whole_run() {
    let provider = SequentialMockProvider::new(vec![
        response(
            "One search coming up.",
            vec![make_tool_call("call_1", "web_search", r#"{"query":"x"}"#)],
        ),
        response("Done searching.", vec![terminate_call("call_2")]),
    ]);

    let config = AppConfig::default();
    let event_bus = Arc::new(EventBus::default());
    let recorder = Arc::new(Recorder::new());
    let mut rx = event_bus.subscribe();

    let tools = Arc::new(openmanus_tools::default_registry(&config).unwrap());
    let runner = TaskRunner::new(Arc::new(provider), tools, &config)
        .with_event_bus(event_bus.clone())
        .with_trace_sink(recorder.clone());

    let mut task = Task::new("search for x");
    runner.run(&mut task, StopSignal::never()).await;

    let mut statuses = Vec::new();
    let mut step_events = 0usize;
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            AgentEvent::StatusChanged { status, .. } => statuses.push(*status),
            AgentEvent::Step { .. } => step_events += 1,
        }
    }
    assert_eq!(statuses, vec![TaskStatus::Running, TaskStatus::Completed]);
    assert_eq!(step_events, task.steps.len());

    let summary = recorder.summary(&task.id.to_string()).unwrap();
    assert_eq!(summary.llm_calls, 2);
    assert_eq!(summary.tool_executions, 2); // web_search + terminate
    assert_eq!(summary.input_tokens, 40);
    assert_eq!(summary.output_tokens, 20);
    assert!(summary.ended_at.is_some());
}

/// Delegates to a script and pulls the stop handle after a given number of
/// completions, so a stop request lands while the run is in flight.
struct StoppingProvider {
    inner: SequentialMockProvider,
    stop_after: usize,
    handle: StopHandle,
}

#[async_trait::async_trait]
impl Provider for StoppingProvider {
    fn name(&self) -> &str {
        "stopping_mock"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let result = self.inner.complete(request).await;
        if self.inner.call_count() >= self.stop_after {
            self.handle.stop();
        }
        result
    }
}

#[tokio::test]
async fn stop_mid_run_halts_before_the_next_step() {
    // The script alone would run for many more steps; the stop lands after
    // the first completion and must be observed before step two.
    let (handle, signal) = stop_channel();
    let provider = StoppingProvider {
        inner: SequentialMockProvider::new(vec![
            response("Starting on part one of the plan.", vec![]),
            response("This answer must never be produced.", vec![]),
        ]),
        stop_after: 1,
        handle,
    };

    let config = AppConfig::default();
    let tools = Arc::new(openmanus_tools::default_registry(&config).unwrap());
    let runner = TaskRunner::new(Arc::new(provider), tools, &config);

    let mut task = Task::new("long running job");
    let outcome = runner.run(&mut task, signal).await;

    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(task.status, TaskStatus::Stopped);

    let assistant_turns: Vec<_> = task
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();
    assert_eq!(assistant_turns.len(), 1);
    assert!(!assistant_turns[0].content.contains("never be produced"));
}

#[tokio::test]
async fn tool_timeout_feeds_back_and_the_loop_continues() {
    let mut config = AppConfig::default();
    config.tools.shell_allowlist = vec!["sleep".into()];
    config.tools.timeout_secs = 1;

    let provider = SequentialMockProvider::new(vec![
        response(
            "This command will take too long.",
            vec![make_tool_call("call_1", "shell", r#"{"command":"sleep 5"}"#)],
        ),
        response("Giving up on the slow command.", vec![terminate_call("call_2")]),
    ]);

    let runner = runner_for(provider, &config);
    let mut task = Task::new("run something slow");
    let outcome = runner.run(&mut task, StopSignal::never()).await;

    // The timeout surfaced to the model as an error message, after which
    // the run still finished normally.
    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task
        .messages
        .iter()
        .any(|m| m.role == Role::Tool && m.content.contains("timed out")));
}

#[tokio::test]
async fn plain_text_answers_do_not_end_the_task_until_terminate() {
    // Text-only responses keep the loop going. Distinct contents so the
    // duplicate detector stays quiet.
    let provider = SequentialMockProvider::new(vec![
        response("Let me think about the first part.", vec![]),
        response("Now the second part follows from it.", vec![terminate_call("call_1")]),
    ]);

    let config = AppConfig::default();
    let runner = runner_for(provider, &config);
    let mut task = Task::new("two part question");
    let outcome = runner.run(&mut task, StopSignal::never()).await;

    assert_eq!(outcome, RunOutcome::Finished);
    let assistant_turns = task
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .count();
    assert_eq!(assistant_turns, 2);
}
