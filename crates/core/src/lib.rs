//! # OpenManus Core
//!
//! Domain types, traits, and error definitions for the OpenManus agent
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is defined as a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod task;
pub mod tool;
pub mod trace;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{AgentEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use task::{RunOutcome, StepKind, StepRecord, Task, TaskId, TaskStatus};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use trace::{NoopSink, SpanKind, TraceSink, TraceSpan};
