//! Mock providers for tests.
//!
//! `SequentialMockProvider` replays a scripted list of responses, which is
//! enough to drive the whole step loop deterministically: text responses,
//! tool-call responses, and the terminate call at the end.

use async_trait::async_trait;
use openmanus_core::error::ProviderError;
use openmanus_core::message::{Message, MessageToolCall};
use openmanus_core::provider::{ProviderRequest, ProviderResponse, Usage};
use openmanus_core::Provider;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A mock provider that returns a scripted sequence of responses.
///
/// Once the script is exhausted the last response is repeated, so a loop
/// that keeps asking does not panic the test harness.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    calls: AtomicUsize,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that always answers with the same text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// A provider that calls one tool, then answers with text.
    pub fn tool_then_answer(tool_name: &str, arguments: &str, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(vec![make_tool_call("call_1", tool_name, arguments)]),
            make_text_response(answer),
        ])
    }

    /// How many completion calls have been made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self
            .responses
            .lock()
            .map_err(|_| ProviderError::Malformed("mock poisoned".into()))?;
        if responses.is_empty() {
            return Err(ProviderError::Malformed("mock has no responses".into()));
        }
        let index = n.min(responses.len() - 1);
        Ok(responses[index].clone())
    }
}

/// Build a plain-text assistant response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-1".into(),
    }
}

/// Build an assistant response that requests the given tool calls.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(String::new(), tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-1".into(),
    }
}

/// Build a single tool call with raw JSON arguments.
pub fn make_tool_call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "mock-1".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn replays_script_in_order() {
        let provider = SequentialMockProvider::new(vec![
            make_text_response("first"),
            make_text_response("second"),
        ]);

        let r1 = provider.complete(request()).await.unwrap();
        let r2 = provider.complete(request()).await.unwrap();
        assert_eq!(r1.message.content, "first");
        assert_eq!(r2.message.content, "second");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn repeats_last_response_when_exhausted() {
        let provider = SequentialMockProvider::single_text("done");
        for _ in 0..3 {
            let r = provider.complete(request()).await.unwrap();
            assert_eq!(r.message.content, "done");
        }
    }

    #[tokio::test]
    async fn tool_then_answer_shape() {
        let provider =
            SequentialMockProvider::tool_then_answer("web_search", r#"{"query":"rust"}"#, "found");

        let r1 = provider.complete(request()).await.unwrap();
        assert_eq!(r1.message.tool_calls.len(), 1);
        assert_eq!(r1.message.tool_calls[0].name, "web_search");

        let r2 = provider.complete(request()).await.unwrap();
        assert_eq!(r2.message.content, "found");
    }
}
