//! Model fallback cascade.
//!
//! Tries each candidate model in order until one answers. Failures that look
//! like "this model does not exist here" move on to the next candidate after a
//! short pause; anything else aborts the cascade.

use super::cancel::CancellationSignal;
use super::retry::Sleeper;
use crate::ai::TextGenerationService;
use crate::error::CandidateFailure;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between candidates after a model-unavailable failure.
pub const DEFAULT_CANDIDATE_PAUSE: Duration = Duration::from_millis(300);

/// Ordered, read-only list of candidate model identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidates(Arc<[String]>);

impl ModelCandidates {
    /// `preferred` goes first; blank and repeated identifiers are skipped.
    pub fn new(preferred: Option<String>, defaults: impl IntoIterator<Item = String>) -> Self {
        let mut models: Vec<String> = Vec::new();
        for model in preferred.into_iter().chain(defaults) {
            let model = model.trim();
            if !model.is_empty() && !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        Self(models.into())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unparsed output of one successful remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    pub model_used: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The candidate is missing or unsupported; try the next one.
    ModelUnavailable,
    /// Anything else; stop the cascade.
    Fatal,
}

const UNAVAILABLE_MARKERS: [&str; 3] = ["not found", "not supported", "404"];

/// Decide whether a failed call should fall through to the next candidate.
///
/// A provider status code wins when present; otherwise the message is scanned
/// for the known "missing model" phrases.
pub fn classify_failure(err: &Error) -> FailureClass {
    match err {
        Error::Cancelled => FailureClass::Fatal,
        Error::Provider {
            status: Some(404), ..
        } => FailureClass::ModelUnavailable,
        other => {
            let message = other.to_string().to_lowercase();
            if UNAVAILABLE_MARKERS.iter().any(|m| message.contains(m)) {
                FailureClass::ModelUnavailable
            } else {
                FailureClass::Fatal
            }
        }
    }
}

pub struct FallbackInvoker {
    service: Arc<dyn TextGenerationService>,
    candidates: ModelCandidates,
    pause: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl FallbackInvoker {
    pub fn new(
        service: Arc<dyn TextGenerationService>,
        candidates: ModelCandidates,
        pause: Duration,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            service,
            candidates,
            pause,
            sleeper,
        }
    }

    pub fn candidates(&self) -> &ModelCandidates {
        &self.candidates
    }

    /// Run one fallback cascade for `prompt`.
    pub async fn invoke(&self, prompt: &str, cancel: &CancellationSignal) -> Result<RawResponse> {
        if self.candidates.is_empty() {
            return Err(Error::Config("No candidate models configured".to_string()));
        }

        debug!("Attempting models: {:?}", self.candidates.as_slice());

        let mut failures = Vec::new();
        let total = self.candidates.len();

        for (index, model) in self.candidates.as_slice().iter().enumerate() {
            debug!("Trying model: {}", model);

            match cancel.guard(self.service.generate(prompt, model)).await {
                Ok(text) => {
                    info!("Generated {} chars with model {}", text.len(), model);
                    return Ok(RawResponse {
                        text,
                        model_used: model.clone(),
                    });
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => match classify_failure(&err) {
                    FailureClass::ModelUnavailable => {
                        warn!("Model {} unavailable: {}", model, err);
                        failures.push(CandidateFailure {
                            model: model.clone(),
                            error: Error::ServiceUnavailable {
                                model: model.clone(),
                                message: err.to_string(),
                            },
                        });
                        if index + 1 < total {
                            cancel
                                .guard(async {
                                    self.sleeper.sleep(self.pause).await;
                                    Ok(())
                                })
                                .await?;
                        }
                    }
                    FailureClass::Fatal => {
                        warn!("Model {} failed, stopping fallback attempts: {}", model, err);
                        return Err(Error::Transport {
                            model: model.clone(),
                            message: err.to_string(),
                        });
                    }
                },
            }
        }

        let err = Error::ExhaustedCandidates { failures };
        warn!("{}", err);
        Err(err)
    }
}
