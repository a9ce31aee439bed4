//! LLM Provider implementations for OpenManus.
//!
//! All providers implement the `openmanus_core::Provider` trait. The step
//! loop never knows which backend it is talking to.

pub mod mock;
pub mod openai_compat;
pub mod retry;

pub use mock::SequentialMockProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;

use openmanus_config::AppConfig;
use openmanus_core::Provider;
use std::sync::Arc;
use std::time::Duration;

/// Build the provider stack from configuration: an OpenAI-compatible client
/// wrapped in the bounded-retry decorator.
///
/// Returns None when no API key is configured.
pub fn build_from_config(config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let api_key = config.api_key.clone()?;
    let inner = Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.base_url,
        api_key,
    ));
    Some(Arc::new(RetryProvider::new(
        inner,
        config.agent.llm_retries,
        Duration::from_millis(config.agent.retry_backoff_ms),
    )))
}
