//! Data models and structures
//!
//! Defines generation requests, the content shapes handed to the UI and storage
//! collaborators, and environment-driven configuration.

use crate::generation::cancel::CancellationSignal;
use crate::generation::invoker::ModelCandidates;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of modules in every generated learning path.
pub const MODULE_COUNT: usize = 5;

/// Default number of flashcards and quiz questions.
pub const DEFAULT_ITEM_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ModuleList,
    FlashcardSet,
    QuizSet,
    ModuleContent,
}

impl OperationKind {
    /// Operations that return a placeholder instead of failing.
    pub fn tolerates_placeholder(self) -> bool {
        !matches!(self, OperationKind::ModuleContent)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::ModuleList => "module-list",
            OperationKind::FlashcardSet => "flashcards",
            OperationKind::QuizSet => "quiz",
            OperationKind::ModuleContent => "module-content",
        };
        f.write_str(name)
    }
}

/// Operation-specific knobs. `count` is only meaningful for flashcards and
/// quizzes; `detailed` only for module content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameters {
    pub count: usize,
    pub detailed: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            count: DEFAULT_ITEM_COUNT,
            detailed: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: OperationKind,
    pub topic: String,
    pub parameters: Parameters,
    pub cancel: CancellationSignal,
}

impl GenerationRequest {
    pub fn new(kind: OperationKind, topic: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            kind,
            topic: topic.into(),
            parameters,
            cancel: CancellationSignal::never(),
        }
    }

    pub fn module_list(topic: impl Into<String>) -> Self {
        Self::new(
            OperationKind::ModuleList,
            topic,
            Parameters {
                count: MODULE_COUNT,
                detailed: false,
            },
        )
    }

    pub fn flashcards(topic: impl Into<String>, count: usize) -> Self {
        Self::new(
            OperationKind::FlashcardSet,
            topic,
            Parameters {
                count,
                detailed: false,
            },
        )
    }

    pub fn quiz(topic: impl Into<String>, count: usize) -> Self {
        Self::new(
            OperationKind::QuizSet,
            topic,
            Parameters {
                count,
                detailed: false,
            },
        )
    }

    pub fn module_content(module_name: impl Into<String>, detailed: bool) -> Self {
        Self::new(
            OperationKind::ModuleContent,
            module_name,
            Parameters {
                count: 0,
                detailed,
            },
        )
    }

    /// Attach a cancellation signal observed at every network call and delay.
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Number of items the result must contain, when the operation has one.
    pub fn expected_len(&self) -> Option<usize> {
        match self.kind {
            OperationKind::ModuleList => Some(MODULE_COUNT),
            OperationKind::FlashcardSet | OperationKind::QuizSet => Some(self.parameters.count),
            OperationKind::ModuleContent => None,
        }
    }
}

/// Learner-supplied context for a chat turn. Missing fields fall back to
/// neutral defaults when the prompt is rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    pub topic: Option<String>,
    pub level: Option<String>,
    pub focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    #[serde(rename = "frontHTML")]
    pub front_html: String,
    #[serde(rename = "backHTML")]
    pub back_html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multiple,
}

/// Either one answer (single choice) or a set of answers (multiple choice).
///
/// Variant order matters for `#[serde(untagged)]` decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub answers: Vec<String>,
    pub correct_answer: CorrectAnswer,
    pub explanation: String,
    pub point: i64,
}

/// Quiz payload as stored by the progress collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSet {
    #[serde(rename = "nrOfQuestions")]
    pub count: String,
    #[serde(rename = "questions")]
    pub items: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Technical,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeExample {
    pub language: String,
    pub code: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub code_example: Option<CodeExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleContent {
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub sections: Vec<Section>,
}

/// Normalised result of a structured generation, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedContent {
    ModuleList(Vec<String>),
    FlashcardSet(Vec<Flashcard>),
    QuizSet(QuizSet),
    ModuleContent(ModuleContent),
}

impl GeneratedContent {
    pub fn kind(&self) -> OperationKind {
        match self {
            GeneratedContent::ModuleList(_) => OperationKind::ModuleList,
            GeneratedContent::FlashcardSet(_) => OperationKind::FlashcardSet,
            GeneratedContent::QuizSet(_) => OperationKind::QuizSet,
            GeneratedContent::ModuleContent(_) => OperationKind::ModuleContent,
        }
    }
}

// Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    Gemini,
    OpenAi,
}

impl AiProvider {
    pub fn parse(value: &str) -> crate::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(AiProvider::Gemini),
            "openai" => Ok(AiProvider::OpenAi),
            other => Err(crate::Error::Config(format!(
                "Unknown provider '{}'. Expected 'gemini' or 'openai'",
                other
            ))),
        }
    }

    /// Built-in candidate models, most preferred first.
    pub fn default_models(self) -> &'static [&'static str] {
        match self {
            AiProvider::Gemini => &[
                "gemini-2.5-flash",
                "gemini-2.5-pro",
                "gemini-2.0-flash-001",
                "gemini-2.0-flash",
            ],
            AiProvider::OpenAi => &["gpt-5-mini", "gpt-5", "gpt-4.1-mini"],
        }
    }

    fn api_key_var(self) -> &'static str {
        match self {
            AiProvider::Gemini => "GEMINI_API_KEY",
            AiProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: AiProvider,
    pub api_key: String,
    pub preferred_model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let provider = match std::env::var("LEARNPATH_PROVIDER") {
            Ok(value) => AiProvider::parse(&value)?,
            Err(_) => AiProvider::Gemini,
        };

        let api_key = std::env::var(provider.api_key_var())
            .map_err(|_| crate::Error::Config(format!("{} not set", provider.api_key_var())))?;

        let request_timeout = match std::env::var("LEARNPATH_TIMEOUT_SECS") {
            Ok(value) => Duration::from_secs(value.trim().parse().map_err(|_| {
                crate::Error::Config(format!("Invalid LEARNPATH_TIMEOUT_SECS '{}'", value))
            })?),
            Err(_) => Duration::from_secs(30),
        };

        Ok(Self {
            provider,
            api_key,
            preferred_model: std::env::var("LEARNPATH_MODEL").ok(),
            base_url: std::env::var("LEARNPATH_BASE_URL").ok(),
            request_timeout,
        })
    }

    /// Preferred model (if any) followed by the provider's built-in defaults.
    pub fn candidates(&self) -> ModelCandidates {
        ModelCandidates::new(
            self.preferred_model.clone(),
            self.provider.default_models().iter().map(|m| m.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flashcard_uses_html_field_names() {
        let card = Flashcard {
            id: 1,
            front_html: "What is Rust?".to_string(),
            back_html: "A systems language.".to_string(),
        };

        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"frontHTML\""));
        assert!(json.contains("\"backHTML\""));
    }

    #[test]
    fn test_quiz_set_serializes_storage_keys() {
        let quiz = QuizSet {
            count: "0".to_string(),
            items: Vec::new(),
        };

        let json = serde_json::to_value(&quiz).unwrap();
        assert_eq!(json, serde_json::json!({ "nrOfQuestions": "0", "questions": [] }));
    }

    #[test]
    fn test_correct_answer_accepts_string_or_list() {
        let one: CorrectAnswer = serde_json::from_str("\"Option A\"").unwrap();
        let many: CorrectAnswer = serde_json::from_str("[\"Option B\", \"Option C\"]").unwrap();

        assert_eq!(one, CorrectAnswer::One("Option A".to_string()));
        assert_eq!(
            many,
            CorrectAnswer::Many(vec!["Option B".to_string(), "Option C".to_string()])
        );
    }

    #[test]
    fn test_expected_len_per_operation() {
        assert_eq!(GenerationRequest::module_list("Rust").expected_len(), Some(5));
        assert_eq!(GenerationRequest::flashcards("Rust", 7).expected_len(), Some(7));
        assert_eq!(GenerationRequest::quiz("Rust", 3).expected_len(), Some(3));
        assert_eq!(
            GenerationRequest::module_content("Rust", true).expected_len(),
            None
        );
    }

    #[test]
    fn test_config_candidates_prepend_preferred_model() {
        let config = Config {
            provider: AiProvider::Gemini,
            api_key: "key".to_string(),
            preferred_model: Some("gemini-exp".to_string()),
            base_url: None,
            request_timeout: Duration::from_secs(30),
        };

        let candidates = config.candidates();
        assert_eq!(
            candidates.as_slice(),
            [
                "gemini-exp",
                "gemini-2.5-flash",
                "gemini-2.5-pro",
                "gemini-2.0-flash-001",
                "gemini-2.0-flash"
            ]
        );
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(AiProvider::parse("Gemini").unwrap(), AiProvider::Gemini);
        assert_eq!(AiProvider::parse(" openai ").unwrap(), AiProvider::OpenAi);
        assert!(AiProvider::parse("bard").is_err());
    }
}
