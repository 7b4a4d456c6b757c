//! Error handling and custom error types
//!
//! Provides unified error handling across the generation pipeline using thiserror.

use crate::generation::validator::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model {model} unavailable: {message}")]
    ServiceUnavailable { model: String, message: String },

    #[error("Transport failure on model {model}: {message}")]
    Transport { model: String, message: String },

    #[error("Decode failure: {0}")]
    Decode(String),

    #[error("Validation failure: {0}")]
    Validation(#[from] ValidationError),

    #[error("All model attempts failed. Errors: {}", describe_failures(.failures))]
    ExhaustedCandidates { failures: Vec<CandidateFailure> },

    #[error("Generation failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: usize,
        #[source]
        last: Box<Error>,
    },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("AI provider error: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

/// One candidate model and the error it produced during a fallback cascade.
#[derive(Debug)]
pub struct CandidateFailure {
    pub model: String,
    pub error: Error,
}

fn describe_failures(failures: &[CandidateFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.model, f.error))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub type Result<T> = std::result::Result<T, Error>;
