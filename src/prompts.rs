//! Prompt templates and the builder that renders them per operation.

use crate::models::{ChatContext, ContentType, GenerationRequest, OperationKind};
use crate::{Error, Result};
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub const MODULE_LIST: &str = include_str!("../data/prompts/module_list.txt");
pub const FLASHCARDS: &str = include_str!("../data/prompts/flashcards.txt");
pub const QUIZ: &str = include_str!("../data/prompts/quiz.txt");
pub const MODULE_CONTENT: &str = include_str!("../data/prompts/module_content.txt");
pub const TECHNICAL_REQUIREMENTS: &str = include_str!("../data/prompts/technical_requirements.txt");
pub const CODE_EXAMPLE: &str = include_str!("../data/prompts/code_example.txt");
pub const TRANSPORT_DIRECTIVE: &str = include_str!("../data/prompts/transport_directive.txt");
pub const CHAT: &str = include_str!("../data/prompts/chat.txt");

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("valid placeholder regex"))
}

/// Replace `{{key}}` placeholders in a template string.
///
/// Substitution is a single pass over the template, so values are inserted
/// verbatim even when they contain `{{...}}` themselves. Unknown keys are left
/// in place.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| {
            vars.iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

const TECH_KEYWORDS: &[&str] = &[
    // programming
    "javascript",
    "python",
    "java",
    "coding",
    "programming",
    "typescript",
    // web
    "html",
    "css",
    "react",
    "angular",
    "vue",
    "frontend",
    "backend",
    "fullstack",
    // database
    "sql",
    "database",
    "mongodb",
    "postgres",
    // software
    "api",
    "development",
    "software",
    "git",
    "devops",
    "algorithms",
    // tech
    "computer science",
    "data structures",
    "networking",
    "cloud",
];

const LANGUAGE_KEYWORDS: &[(&str, &[&str])] = &[
    ("javascript", &["javascript", "js", "node", "react", "vue", "angular"]),
    ("python", &["python", "django", "flask"]),
    ("java", &["java", "spring"]),
    ("html", &["html", "markup"]),
    ("css", &["css", "styling", "scss"]),
    ("sql", &["sql", "database", "mysql", "postgresql"]),
    ("typescript", &["typescript", "ts"]),
];

/// Whether a module name reads as a programming/technology topic.
pub fn classify_topic(topic: &str) -> ContentType {
    let topic = topic.to_lowercase();
    if TECH_KEYWORDS.iter().any(|k| topic.contains(k)) {
        ContentType::Technical
    } else {
        ContentType::General
    }
}

/// Language to use for code examples; first keyword group that matches wins.
pub fn language_for_topic(topic: &str) -> &'static str {
    let topic = topic.to_lowercase();
    LANGUAGE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| topic.contains(k)))
        .map(|(language, _)| *language)
        .unwrap_or("javascript")
}

/// Renders operation prompts. Pure: the same request always yields the same text.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Full prompt for a structured generation, transport directive included.
    pub fn build(request: &GenerationRequest) -> Result<String> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "{} requires a non-empty topic",
                request.kind
            )));
        }

        let count = request.parameters.count.to_string();
        let (body, shape) = match request.kind {
            OperationKind::ModuleList => (render(MODULE_LIST, &[("topic", topic)]), "array"),
            OperationKind::FlashcardSet | OperationKind::QuizSet => {
                if request.parameters.count == 0 {
                    return Err(Error::InvalidRequest(format!(
                        "{} requires a count of at least 1",
                        request.kind
                    )));
                }
                let template = if request.kind == OperationKind::FlashcardSet {
                    FLASHCARDS
                } else {
                    QUIZ
                };
                (render(template, &[("topic", topic), ("count", &count)]), "array")
            }
            OperationKind::ModuleContent => {
                (Self::module_content(topic, request.parameters.detailed), "object")
            }
        };

        Ok(body + &render(TRANSPORT_DIRECTIVE, &[("shape", shape)]))
    }

    fn module_content(topic: &str, detailed: bool) -> String {
        let content_type = classify_topic(topic);
        let level = if detailed { "Advanced" } else { "Basic" };

        let (type_label, type_name, requirements, code_example) = match content_type {
            ContentType::Technical => (
                "Technical/Programming",
                "technical",
                TECHNICAL_REQUIREMENTS.to_string(),
                render(CODE_EXAMPLE, &[("language", language_for_topic(topic))])
                    .trim_end()
                    .to_string(),
            ),
            ContentType::General => ("General", "general", String::new(), "null".to_string()),
        };

        render(
            MODULE_CONTENT,
            &[
                ("topic", topic),
                ("type_label", type_label),
                ("level", level),
                ("technical_requirements", &requirements),
                ("content_type", type_name),
                ("code_example", &code_example),
            ],
        )
    }

    /// Chat prompt. Replies are passed through verbatim, so no directive.
    pub fn chat(message: &str, context: &ChatContext) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidRequest(
                "chat requires a non-empty message".to_string(),
            ));
        }

        let pick = |value: &Option<String>, default: &'static str| -> String {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        Ok(render(
            CHAT,
            &[
                ("topic", &pick(&context.topic, "General")),
                ("level", &pick(&context.level, "Intermediate")),
                ("focus", &pick(&context.focus, "General understanding")),
                ("message", message),
            ],
        ))
    }
}
