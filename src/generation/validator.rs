//! Structural validation of decoded payloads.
//!
//! Each operation has one accepted shape. Collections must have exactly the
//! requested number of items; a short or long array is as invalid as a
//! missing field.

use crate::models::{
    CodeExample, ContentType, CorrectAnswer, Flashcard, GeneratedContent, GenerationRequest,
    ModuleContent, OperationKind, QuestionType, QuizQuestion, QuizSet, Section, MODULE_COUNT,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// Section bodies must be longer than this many characters.
pub const MIN_SECTION_CONTENT_CHARS: usize = 50;

/// Answer options per quiz question.
pub const QUIZ_ANSWER_COUNT: usize = 4;

const DEFAULT_CODE_LANGUAGE: &str = "javascript";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unexpected shape: {0}")]
    Shape(String),

    #[error("expected exactly {expected} items, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("{location}: field `{field}` is empty")]
    EmptyField {
        location: String,
        field: &'static str,
    },

    #[error("question {index}: expected {} answers, got {actual}", QUIZ_ANSWER_COUNT)]
    AnswerCount { index: usize, actual: usize },

    #[error("question {index}: correct answer does not fit a {question_type:?} question")]
    InconsistentAnswer {
        index: usize,
        question_type: QuestionType,
    },

    #[error("module content has no sections")]
    NoSections,

    #[error(
        "section {index}: content has {length} chars, needs more than {}",
        MIN_SECTION_CONTENT_CHARS
    )]
    ContentTooShort { index: usize, length: usize },
}

/// Check `value` against the shape required by `request` and normalise it.
pub fn validate(
    value: &Value,
    request: &GenerationRequest,
) -> Result<GeneratedContent, ValidationError> {
    match (request.kind, request.expected_len()) {
        (OperationKind::ModuleContent, _) => {
            module_content(value).map(GeneratedContent::ModuleContent)
        }
        (kind, None) => Err(ValidationError::Shape(format!("{} has no item count", kind))),
        (OperationKind::ModuleList, Some(count)) => {
            titles(value, count).map(GeneratedContent::ModuleList)
        }
        (OperationKind::FlashcardSet, Some(count)) => {
            flashcards(value, count).map(GeneratedContent::FlashcardSet)
        }
        (OperationKind::QuizSet, Some(count)) => quiz_questions(value, count).map(|items| {
            GeneratedContent::QuizSet(QuizSet {
                count: count.to_string(),
                items,
            })
        }),
    }
}

fn parse<T: DeserializeOwned>(value: &Value) -> Result<T, ValidationError> {
    T::deserialize(value).map_err(|e| ValidationError::Shape(e.to_string()))
}

fn expect_len(value: &Value, expected: usize) -> Result<(), ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::Shape(format!("expected a JSON array, got {}", json_type(value))))?;
    if items.len() != expected {
        return Err(ValidationError::WrongLength {
            expected,
            actual: items.len(),
        });
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn require_text(text: &str, location: impl FnOnce() -> String, field: &'static str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            location: location(),
            field,
        });
    }
    Ok(())
}

pub fn module_list(value: &Value) -> Result<Vec<String>, ValidationError> {
    titles(value, MODULE_COUNT)
}

fn titles(value: &Value, count: usize) -> Result<Vec<String>, ValidationError> {
    expect_len(value, count)?;
    let titles: Vec<String> = parse(value)?;
    for (i, title) in titles.iter().enumerate() {
        require_text(title, || format!("module {}", i + 1), "title")?;
    }
    Ok(titles)
}

pub fn flashcards(value: &Value, count: usize) -> Result<Vec<Flashcard>, ValidationError> {
    expect_len(value, count)?;
    let cards: Vec<Flashcard> = parse(value)?;
    for (i, card) in cards.iter().enumerate() {
        require_text(&card.front_html, || format!("card {}", i + 1), "frontHTML")?;
        require_text(&card.back_html, || format!("card {}", i + 1), "backHTML")?;
    }
    Ok(cards)
}

pub fn quiz_questions(value: &Value, count: usize) -> Result<Vec<QuizQuestion>, ValidationError> {
    expect_len(value, count)?;
    let questions: Vec<QuizQuestion> = parse(value)?;

    for (i, q) in questions.iter().enumerate() {
        let index = i + 1;
        require_text(&q.question, || format!("question {}", index), "question")?;

        if q.answers.len() != QUIZ_ANSWER_COUNT {
            return Err(ValidationError::AnswerCount {
                index,
                actual: q.answers.len(),
            });
        }

        let consistent = match (&q.question_type, &q.correct_answer) {
            (QuestionType::Single, CorrectAnswer::One(answer)) => !answer.trim().is_empty(),
            (QuestionType::Multiple, CorrectAnswer::Many(answers)) => {
                !answers.is_empty() && answers.iter().all(|a| !a.trim().is_empty())
            }
            _ => false,
        };
        if !consistent {
            return Err(ValidationError::InconsistentAnswer {
                index,
                question_type: q.question_type,
            });
        }
    }

    Ok(questions)
}

#[derive(Debug, Deserialize)]
struct RawModuleContent {
    title: String,
    #[serde(rename = "type")]
    content_type: ContentType,
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSection {
    title: String,
    content: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    code_example: Option<Value>,
}

pub fn module_content(value: &Value) -> Result<ModuleContent, ValidationError> {
    let raw: RawModuleContent = parse(value)?;

    require_text(&raw.title, || "module".to_string(), "title")?;
    if raw.sections.is_empty() {
        return Err(ValidationError::NoSections);
    }

    for (i, section) in raw.sections.iter().enumerate() {
        require_text(&section.title, || format!("section {}", i + 1), "title")?;
        let length = section.content.chars().count();
        if length <= MIN_SECTION_CONTENT_CHARS {
            return Err(ValidationError::ContentTooShort {
                index: i + 1,
                length,
            });
        }
    }

    let sections = raw
        .sections
        .into_iter()
        .map(|section| Section {
            title: section.title,
            content: sanitize_content(&section.content),
            key_points: section.key_points,
            code_example: section.code_example.as_ref().and_then(clean_code_example),
        })
        .collect();

    Ok(ModuleContent {
        title: raw.title,
        content_type: raw.content_type,
        sections,
    })
}

/// Strip markdown leftovers from section prose and unescape doubled escapes.
pub fn sanitize_content(text: &str) -> String {
    text.replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace('`', "")
        .replace("\\n", "\n")
        .replace("\\\\", "\\")
        .trim()
        .to_string()
}

fn code_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+-]*\n?").expect("valid code fence regex"))
}

fn leading_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^// ").expect("valid comment regex"))
}

/// Normalise a section's code example. Anything without usable code is dropped.
pub fn clean_code_example(value: &Value) -> Option<CodeExample> {
    let object = value.as_object()?;
    let code = object.get("code")?.as_str()?;

    let code = code_fence().replace_all(code, "");
    let code = leading_comment().replace_all(&code, "");
    let code = code.trim();
    if code.is_empty() {
        return None;
    }

    let language = object
        .get("language")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_CODE_LANGUAGE);
    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(CodeExample {
        language: language.to_string(),
        code: code.to_string(),
        explanation: explanation.to_string(),
    })
}
