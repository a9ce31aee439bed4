//! `openmanus run` One-shot task execution, streaming steps to stdout.

use anyhow::{anyhow, bail, Context};
use std::sync::Arc;

use openmanus_agent::{stop_channel, TaskRunner};
use openmanus_config::AppConfig;
use openmanus_core::event::{AgentEvent, EventBus};
use openmanus_core::task::{RunOutcome, StepKind, StepRecord, Task};
use openmanus_telemetry::Recorder;

/// Longest tool output echoed to the terminal before truncation.
const MAX_OBSERVATION_CHARS: usize = 400;

pub async fn run(
    prompt: String,
    model: Option<String>,
    max_steps: Option<u32>,
) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;

    let Some(provider) = openmanus_providers::build_from_config(&config) else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENMANUS_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'");
        eprintln!();
        eprintln!("  Or add api_key to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found. See above for setup instructions.");
    };

    let tools = Arc::new(
        openmanus_tools::default_registry(&config).map_err(|e| anyhow!("Tool setup failed: {e}"))?,
    );

    let event_bus = Arc::new(EventBus::default());
    let recorder = Arc::new(Recorder::new());
    let mut rx = event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let AgentEvent::Step { record, .. } = event.as_ref() {
                print_step(record);
            }
        }
    });

    let mut runner = TaskRunner::new(provider, tools, &config)
        .with_event_bus(event_bus.clone())
        .with_trace_sink(recorder.clone());
    if let Some(model) = model {
        runner = runner.with_model(model);
    }
    if let Some(max) = max_steps {
        runner = runner.with_max_steps(max);
    }

    // Ctrl+C requests a cooperative stop instead of killing the process.
    let (stop_handle, stop_signal) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Stop requested, finishing current step...");
            stop_handle.stop();
        }
    });

    let mut task = Task::new(prompt);
    let outcome = runner.run(&mut task, stop_signal).await;

    // Close the bus so the printer drains and exits.
    drop(runner);
    drop(event_bus);
    let _ = printer.await;

    if let Some(summary) = recorder.summary(&task.id.to_string()) {
        eprintln!(
            "  {} steps, {} LLM calls, {} tool runs, {} tokens in / {} out",
            task.steps.iter().map(|s| s.step).max().unwrap_or(0),
            summary.llm_calls,
            summary.tool_executions,
            summary.input_tokens,
            summary.output_tokens,
        );
    }

    match outcome {
        RunOutcome::Finished | RunOutcome::StepBudgetExhausted => {
            println!();
            println!("{}", task.result.as_deref().unwrap_or("Task completed."));
            Ok(())
        }
        RunOutcome::Stopped => {
            println!();
            println!("Task stopped.");
            Ok(())
        }
        RunOutcome::Failed(e) => Err(anyhow!("Task failed: {e}")),
    }
}

fn print_step(record: &StepRecord) {
    match record.kind {
        StepKind::Think => {
            if !record.content.is_empty() {
                println!("  [{:>2}] {}", record.step, record.content);
            }
        }
        StepKind::Tool => {
            let name = record.tool_name.as_deref().unwrap_or("?");
            let args = record
                .tool_args
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default();
            println!("  [{:>2}] -> {name} {args}", record.step);
        }
        StepKind::Act => {
            let name = record.tool_name.as_deref().unwrap_or("?");
            println!(
                "  [{:>2}] <- {name}: {}",
                record.step,
                truncate(&record.content, MAX_OBSERVATION_CHARS)
            );
        }
        StepKind::Log | StepKind::Error => {
            eprintln!("  [{:>2}] {}", record.step, record.content);
        }
        // The final answer is printed once, after the run.
        StepKind::Complete => {}
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{cut}... [truncated]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_preserves_short_strings() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        let long = "é".repeat(500);
        let cut = truncate(&long, 400);
        assert!(cut.ends_with("[truncated]"));
        assert_eq!(cut.chars().filter(|c| *c == 'é').count(), 400);
    }
}
