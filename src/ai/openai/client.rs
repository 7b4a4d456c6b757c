use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ErrorResponse};
use crate::ai::TextGenerationService;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI-compatible chat completions client; the model is chosen per call.
pub struct OpenAiTextClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiTextClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, timeout, Client::new())
    }

    pub fn new_with_client(api_key: String, timeout: Duration, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(parsed) => match parsed.error.code {
                Some(code) => format!(
                    "OpenAI API error (status {}, code {}): {}",
                    status, code, parsed.error.message
                ),
                None => format!("OpenAI API error (status {}): {}", status, parsed.error.message),
            },
            Err(_) => format!("OpenAI API error (status {}): {}", status, body),
        }
    }
}

#[async_trait]
impl TextGenerationService for OpenAiTextClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            max_completion_tokens: 8192,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to OpenAI: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("OpenAI API error (status {}): {}", status, error_text);
            return Err(Error::Provider {
                status: Some(status.as_u16()),
                message: Self::describe_error(status, &error_text),
            });
        }

        let body = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse OpenAI response: {}\nBody: {}", e, body);
            Error::Provider {
                status: None,
                message: format!("Failed to parse OpenAI response: {}", e),
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Provider {
                status: None,
                message: "No response from OpenAI chat API".to_string(),
            })
    }
}
