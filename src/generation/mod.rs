//! Generation pipeline
//!
//! [`Generator`] runs prompt → fallback cascade → decode → validate for each
//! request and applies the operation's terminal policy: lists, flashcards and
//! quizzes fall back to a placeholder after one failed pass, module content is
//! retried under a [`RetryPolicy`] and surfaces its last error.

pub mod cancel;
pub mod decoder;
pub mod invoker;
pub mod placeholder;
pub mod retry;
pub mod validator;

pub use cancel::{cancellation, CancellationSignal, Canceller};
pub use decoder::{DecodedPayload, RecoveryStage};
pub use invoker::{classify_failure, FailureClass, FallbackInvoker, ModelCandidates, RawResponse};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use validator::ValidationError;

use crate::ai::TextGenerationService;
use crate::models::{
    ChatContext, Flashcard, GeneratedContent, GenerationRequest, ModuleContent, QuizSet,
};
use crate::prompts::PromptBuilder;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Tunables for the pipeline, passed in at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Outer attempts for operations without a placeholder.
    pub retry: RetryPolicy,
    /// Pause before trying the next candidate model.
    pub candidate_pause: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            candidate_pause: invoker::DEFAULT_CANDIDATE_PAUSE,
        }
    }
}

pub struct Generator {
    invoker: FallbackInvoker,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Generator {
    pub fn new(
        service: Arc<dyn TextGenerationService>,
        candidates: ModelCandidates,
        settings: GenerationSettings,
    ) -> Self {
        Self::with_sleeper(service, candidates, settings, Arc::new(TokioSleeper))
    }

    /// Build a generator whose pauses go through `sleeper`.
    pub fn with_sleeper(
        service: Arc<dyn TextGenerationService>,
        candidates: ModelCandidates,
        settings: GenerationSettings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            invoker: FallbackInvoker::new(
                service,
                candidates,
                settings.candidate_pause,
                sleeper.clone(),
            ),
            retry: settings.retry,
            sleeper,
        }
    }

    pub fn candidates(&self) -> &ModelCandidates {
        self.invoker.candidates()
    }

    /// Run one structured generation under its operation's policy.
    ///
    /// Lists, flashcards and quizzes only fail on an invalid request or
    /// cancellation; module content fails with [`Error::ExhaustedRetries`]
    /// once the retry budget is spent.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GeneratedContent> {
        let prompt = PromptBuilder::build(&request)?;

        if request.kind.tolerates_placeholder() {
            self.single_pass(&request, &prompt).await
        } else {
            self.bounded_retry(&request, &prompt).await
        }
    }

    async fn single_pass(&self, request: &GenerationRequest, prompt: &str) -> Result<GeneratedContent> {
        match self.attempt(request, prompt).await {
            Ok(content) => Ok(content),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(
                    "[{}] Generation for '{}' failed, using placeholder: {}",
                    request.kind, request.topic, e
                );
                placeholder::synthesize(request).ok_or_else(|| {
                    Error::Invariant(format!("No placeholder for {}", request.kind))
                })
            }
        }
    }

    async fn bounded_retry(&self, request: &GenerationRequest, prompt: &str) -> Result<GeneratedContent> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut delays = self.retry.delays();
        let mut attempt = 0;

        loop {
            attempt += 1;
            info!(
                "[{}] Attempt {}/{} for '{}'",
                request.kind, attempt, max_attempts, request.topic
            );

            let err = match self.attempt(request, prompt).await {
                Ok(content) => return Ok(content),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => e,
            };

            match delays.next() {
                Some(delay) => {
                    warn!(
                        "[{}] Attempt {} failed: {}. Will retry...",
                        request.kind, attempt, err
                    );
                    request
                        .cancel
                        .guard(async {
                            self.sleeper.sleep(delay).await;
                            Ok(())
                        })
                        .await?;
                }
                None => {
                    error!(
                        "[{}] Failed to generate '{}' after {} attempts: {}",
                        request.kind, request.topic, attempt, err
                    );
                    return Err(Error::ExhaustedRetries {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
            }
        }
    }

    /// One pass: fallback cascade, then decode and validate the response.
    async fn attempt(&self, request: &GenerationRequest, prompt: &str) -> Result<GeneratedContent> {
        let raw = self.invoker.invoke(prompt, &request.cancel).await?;

        let (content, stage) =
            decoder::decode_with(&raw.text, |value| validator::validate(value, request))?;

        info!(
            "[{}] Accepted response from {} (recovered via {})",
            request.kind, raw.model_used, stage
        );
        Ok(content)
    }

    pub async fn module_list(&self, topic: &str) -> Result<Vec<String>> {
        match self.generate(GenerationRequest::module_list(topic)).await? {
            GeneratedContent::ModuleList(modules) => Ok(modules),
            other => Err(unexpected(other)),
        }
    }

    pub async fn flashcards(&self, topic: &str, count: usize) -> Result<Vec<Flashcard>> {
        match self.generate(GenerationRequest::flashcards(topic, count)).await? {
            GeneratedContent::FlashcardSet(cards) => Ok(cards),
            other => Err(unexpected(other)),
        }
    }

    pub async fn quiz(&self, topic: &str, count: usize) -> Result<QuizSet> {
        match self.generate(GenerationRequest::quiz(topic, count)).await? {
            GeneratedContent::QuizSet(quiz) => Ok(quiz),
            other => Err(unexpected(other)),
        }
    }

    pub async fn module_content(&self, module_name: &str, detailed: bool) -> Result<ModuleContent> {
        match self
            .generate(GenerationRequest::module_content(module_name, detailed))
            .await?
        {
            GeneratedContent::ModuleContent(content) => Ok(content),
            other => Err(unexpected(other)),
        }
    }

    /// Free-form chat reply; the model's text is returned unchanged.
    pub async fn chat(&self, message: &str, context: &ChatContext) -> Result<String> {
        self.chat_with_cancellation(message, context, &CancellationSignal::never())
            .await
    }

    pub async fn chat_with_cancellation(
        &self,
        message: &str,
        context: &ChatContext,
        cancel: &CancellationSignal,
    ) -> Result<String> {
        let prompt = PromptBuilder::chat(message, context)?;
        let raw = self.invoker.invoke(&prompt, cancel).await?;
        Ok(raw.text)
    }
}

fn unexpected(content: GeneratedContent) -> Error {
    Error::Invariant(format!("Pipeline returned {} content", content.kind()))
}
