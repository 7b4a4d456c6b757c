//! Deterministic offline content returned when generation fails for
//! operations that prefer a degraded answer over an error.

use crate::models::{Flashcard, GeneratedContent, GenerationRequest, OperationKind, QuizSet};

pub fn module_list(topic: &str) -> Vec<String> {
    vec![
        format!("Module 1: Introduction to {}", topic),
        format!("Module 2: Core Concepts of {}", topic),
        format!("Module 3: Intermediate {} Techniques", topic),
        format!("Module 4: Advanced {} Applications", topic),
        format!("Module 5: Real-world {} Projects", topic),
    ]
}

pub fn flashcards(topic: &str, count: usize) -> Vec<Flashcard> {
    (1..=count)
        .map(|i| Flashcard {
            id: i as i64,
            front_html: format!("Basic to advanced {} question {}?", topic, i),
            back_html: format!(
                "Detailed answer explaining {} at difficulty level {}.",
                topic, i
            ),
        })
        .collect()
}

/// An empty quiz; the UI treats zero questions as "nothing to take".
pub fn quiz() -> QuizSet {
    QuizSet {
        count: "0".to_string(),
        items: Vec::new(),
    }
}

/// Placeholder for `request`, or `None` when the operation has no safe stand-in.
pub fn synthesize(request: &GenerationRequest) -> Option<GeneratedContent> {
    match request.kind {
        OperationKind::ModuleList => Some(GeneratedContent::ModuleList(module_list(&request.topic))),
        OperationKind::FlashcardSet => Some(GeneratedContent::FlashcardSet(flashcards(
            &request.topic,
            request.parameters.count,
        ))),
        OperationKind::QuizSet => Some(GeneratedContent::QuizSet(quiz())),
        OperationKind::ModuleContent => None,
    }
}
