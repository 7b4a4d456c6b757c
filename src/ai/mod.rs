//! AI service integration for text generation
//!
//! Defines the text-generation boundary used by the pipeline and provides
//! Gemini and OpenAI adapters plus a scripted mock for tests.

pub mod gemini;
pub mod mock;
pub mod openai;

pub use gemini::GeminiTextClient;
pub use mock::{MockReply, MockTextClient};
pub use openai::OpenAiTextClient;

use crate::Result;
use async_trait::async_trait;

/// Remote text generation. `model` is an opaque provider model identifier.
///
/// Implementations report non-success HTTP statuses as
/// [`crate::Error::Provider`] with the status code attached so callers can
/// classify failures without parsing messages.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}
