//! Learning-path content generator
//!
//! Turns a topic into structured learning material (module outlines,
//! flashcards, quizzes and module lessons) by prompting a hosted text model,
//! falling back across candidate models and recovering JSON from the
//! formatting quirks model output tends to have.

pub mod ai;
pub mod app;
pub mod error;
pub mod generation;
pub mod models;
pub mod prompts;

pub use error::{Error, Result};
