//! Task execution engine for OpenManus.
//!
//! The [`TaskRunner`] drives a step-bounded think/act loop against an LLM
//! provider and a tool registry. [`StuckDetector`] watches for the loop
//! going in circles and nudges the model onto a new path.

pub mod prompt;
pub mod runner;
pub mod stuck;

pub use runner::{stop_channel, StopHandle, StopSignal, TaskRunner};
pub use stuck::StuckDetector;
