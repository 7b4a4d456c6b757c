use super::TextGenerationService;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One scripted outcome of a mock generation call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Failure {
        status: Option<u16>,
        message: String,
    },
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn failure(status: Option<u16>, message: impl Into<String>) -> Self {
        MockReply::Failure {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    replies: Vec<MockReply>,
    model_replies: HashMap<String, Vec<MockReply>>,
    model_counts: HashMap<String, usize>,
    calls: Vec<(String, String)>,
}

/// Scripted [`TextGenerationService`]. Clones share state so a clone can be
/// kept as a probe after the original is handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MockTextClient {
    state: Arc<Mutex<MockState>>,
}

impl MockTextClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used for any model without its own script; replies cycle.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.state.lock().unwrap().replies.push(reply);
        self
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_reply(MockReply::text(text))
    }

    /// Reply for one specific model; replies cycle per model.
    pub fn with_model_reply(self, model: &str, reply: MockReply) -> Self {
        self.state
            .lock()
            .unwrap()
            .model_replies
            .entry(model.to_string())
            .or_default()
            .push(reply);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Models called so far, in call order.
    pub fn called_models(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(model, _)| model.clone())
            .collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl TextGenerationService for MockTextClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            let call_index = state.calls.len();
            state.calls.push((model.to_string(), prompt.to_string()));

            let model_index = {
                let count = state.model_counts.entry(model.to_string()).or_insert(0);
                *count += 1;
                *count - 1
            };

            match state.model_replies.get(model) {
                Some(replies) if !replies.is_empty() => {
                    Some(replies[model_index % replies.len()].clone())
                }
                _ if !state.replies.is_empty() => {
                    Some(state.replies[call_index % state.replies.len()].clone())
                }
                _ => None,
            }
        };

        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Failure { status, message }) => {
                Err(Error::Provider { status, message })
            }
            None => Ok(format!("Mock response from {}", model)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_default_response_names_model() {
        let client = MockTextClient::new();
        let text = client.generate("hello", "gemini-2.5-flash").await.unwrap();
        assert!(text.contains("gemini-2.5-flash"));
    }

    #[tokio::test]
    async fn test_mock_custom_responses_cycle() {
        let client = MockTextClient::new()
            .with_response("first")
            .with_response("second");

        assert_eq!(client.generate("p", "m").await.unwrap(), "first");
        assert_eq!(client.generate("p", "m").await.unwrap(), "second");
        // Should cycle back
        assert_eq!(client.generate("p", "m").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_mock_model_script_takes_precedence() {
        let client = MockTextClient::new()
            .with_response("shared")
            .with_model_reply("broken", MockReply::failure(Some(404), "model not found"));

        let err = client.generate("p", "broken").await.unwrap_err();
        assert!(matches!(err, Error::Provider { status: Some(404), .. }));
        assert_eq!(client.generate("p", "healthy").await.unwrap(), "shared");
    }

    #[tokio::test]
    async fn test_mock_records_calls_across_clones() {
        let client = MockTextClient::new();
        let probe = client.clone();

        client.generate("one", "a").await.unwrap();
        client.generate("two", "b").await.unwrap();

        assert_eq!(probe.get_call_count(), 2);
        assert_eq!(probe.called_models(), vec!["a", "b"]);
        assert_eq!(probe.prompts(), vec!["one", "two"]);
    }
}
