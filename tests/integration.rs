use async_trait::async_trait;
use base64::Engine as _;
use learnpath_generator::{
    ai::{GeminiTextClient, MockReply, MockTextClient, OpenAiTextClient, TextGenerationService},
    app::{App, Task},
    generation::{
        cancellation, Canceller, GenerationSettings, Generator, ModelCandidates,
        RecordingSleeper, RetryPolicy, Sleeper,
    },
    models::{
        AiProvider, ChatContext, Config, ContentType, CorrectAnswer, GenerationRequest,
        GeneratedContent, QuestionType,
    },
    Error,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn encode(value: &Value) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.to_string())
}

fn gemini_body(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

fn generator_with(client: &MockTextClient, models: &[&str], sleeper: &RecordingSleeper) -> Generator {
    Generator::with_sleeper(
        Arc::new(client.clone()),
        ModelCandidates::new(None, models.iter().map(|m| m.to_string())),
        GenerationSettings::default(),
        Arc::new(sleeper.clone()),
    )
}

fn module_titles(topic: &str) -> Value {
    json!([
        format!("Module 1: {} Fundamentals", topic),
        format!("Module 2: {} Building Blocks", topic),
        format!("Module 3: {} in Practice", topic),
        format!("Module 4: Advanced {}", topic),
        format!("Module 5: {} Capstone", topic)
    ])
}

#[tokio::test]
async fn test_gemini_cascade_skips_missing_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(
                r#"{"error":{"message":"models/gemini-2.5-flash is not found for API version v1beta"}}"#,
            ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let titles = module_titles("Python");
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(&encode(&titles))))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiTextClient::new("test-key".to_string(), Duration::from_secs(5))
        .with_base_url(server.uri());
    let sleeper = RecordingSleeper::new();
    let generator = Generator::with_sleeper(
        Arc::new(client),
        ModelCandidates::new(
            None,
            AiProvider::Gemini
                .default_models()
                .iter()
                .map(|m| m.to_string()),
        ),
        GenerationSettings::default(),
        Arc::new(sleeper.clone()),
    );

    let modules = assert_ok!(generator.module_list("Python").await);

    assert_eq!(json!(modules), titles);
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(300)]);
}

#[tokio::test]
async fn test_openai_fatal_status_falls_back_to_placeholder() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiTextClient::new("bad-key".to_string(), Duration::from_secs(5))
        .with_base_url(server.uri());
    let sleeper = RecordingSleeper::new();
    let generator = Generator::with_sleeper(
        Arc::new(client),
        ModelCandidates::new(
            None,
            AiProvider::OpenAi
                .default_models()
                .iter()
                .map(|m| m.to_string()),
        ),
        GenerationSettings::default(),
        Arc::new(sleeper.clone()),
    );

    let cards = assert_ok!(generator.flashcards("Photosynthesis", 3).await);

    assert_eq!(cards.len(), 3);
    assert!(cards[0].front_html.contains("Photosynthesis"));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_app_from_config_talks_to_configured_base_url() {
    let server = MockServer::start().await;

    let lesson = json!({
        "title": "Rust Ownership",
        "type": "technical",
        "sections": [{
            "title": "Moves",
            "content": "Assigning a String to a new binding moves it; the old binding can no longer be used.",
            "keyPoints": ["Moves transfer ownership"],
            "codeExample": {
                "language": "rust",
                "code": "```rust\nlet a = String::new();\nlet b = a;\n```",
                "explanation": "a is moved into b"
            }
        }]
    });
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(&format!(
            "```json\n{}\n```",
            lesson
        ))))
        .mount(&server)
        .await;

    let config = Config {
        provider: AiProvider::Gemini,
        api_key: "test-key".to_string(),
        preferred_model: None,
        base_url: Some(server.uri()),
        request_timeout: Duration::from_secs(5),
    };
    let app = App::from_config(&config);

    let output = assert_ok!(
        app.run(Task::Content {
            module: "Rust Ownership".to_string(),
            detailed: true,
        })
        .await
    );

    let value: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["type"], "technical");
    assert_eq!(
        value["sections"][0]["codeExample"]["code"],
        "let a = String::new();\nlet b = a;"
    );
    assert_eq!(value["sections"][0]["keyPoints"][0], "Moves transfer ownership");
}

#[tokio::test]
async fn test_quiz_with_mixed_question_types() {
    let questions = json!([
        {
            "question": "Which planet is largest?",
            "questionType": "single",
            "answers": ["Mars", "Jupiter", "Venus", "Mercury"],
            "correctAnswer": "Jupiter",
            "explanation": "Jupiter is the largest planet.",
            "point": 10
        },
        {
            "question": "Which planets are gas giants?",
            "questionType": "multiple",
            "answers": ["Jupiter", "Saturn", "Earth", "Mars"],
            "correctAnswer": ["Jupiter", "Saturn"],
            "explanation": "Jupiter and Saturn are gas giants.",
            "point": 20
        }
    ]);
    let client = MockTextClient::new().with_response(format!(
        "Here is your quiz:\n\n{}\n",
        encode(&questions)
    ));
    let sleeper = RecordingSleeper::new();

    let quiz = assert_ok!(
        generator_with(&client, &["gemini-2.5-flash"], &sleeper)
            .quiz("Planets", 2)
            .await
    );

    assert_eq!(quiz.count, "2");
    assert_eq!(quiz.items[1].question_type, QuestionType::Multiple);
    assert_eq!(
        quiz.items[1].correct_answer,
        CorrectAnswer::Many(vec!["Jupiter".to_string(), "Saturn".to_string()])
    );
}

#[tokio::test]
async fn test_module_content_error_is_surfaced_not_replaced() {
    let client = MockTextClient::new().with_reply(MockReply::failure(Some(500), "upstream down"));
    let sleeper = RecordingSleeper::new();

    let err = assert_err!(
        generator_with(&client, &["gemini-2.5-flash", "gemini-2.5-pro"], &sleeper)
            .module_content("Medieval Castles", false)
            .await
    );

    match err {
        Error::ExhaustedRetries { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, Error::Transport { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Fatal failures stop each cascade at the first model.
    assert_eq!(client.called_models(), vec!["gemini-2.5-flash"; 3]);
    assert_eq!(sleeper.total(), Duration::from_secs(2));
}

#[tokio::test]
async fn test_single_retry_policy_makes_one_attempt() {
    let client = MockTextClient::new().with_response("{\"title\": \"broken\"");
    let generator = Generator::with_sleeper(
        Arc::new(client.clone()),
        ModelCandidates::new(Some("gemini-2.5-flash".to_string()), Vec::new()),
        GenerationSettings {
            retry: RetryPolicy::single(),
            candidate_pause: Duration::ZERO,
        },
        Arc::new(RecordingSleeper::new()),
    );

    let err = assert_err!(generator.module_content("Watercolour Basics", false).await);

    assert!(matches!(err, Error::ExhaustedRetries { attempts: 1, .. }));
    assert_eq!(client.get_call_count(), 1);
}

#[tokio::test]
async fn test_general_module_content_drops_code_example() {
    let lesson = json!({
        "title": "Medieval Castles",
        "type": "general",
        "sections": [{
            "title": "Keeps and Baileys",
            "content": "The keep was the strongest building of a castle and the last line of defence.",
            "keyPoints": ["The keep is the core stronghold"],
            "codeExample": null
        }]
    });
    let client = MockTextClient::new().with_response(encode(&lesson));
    let sleeper = RecordingSleeper::new();

    let content = assert_ok!(
        generator_with(&client, &["gemini-2.5-flash"], &sleeper)
            .module_content("Medieval Castles", false)
            .await
    );

    assert_eq!(content.content_type, ContentType::General);
    assert_eq!(content.sections[0].code_example, None);

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("Type: General"));
    assert!(prompt.contains("base64-encode"));
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let client = MockTextClient::new().with_reply(MockReply::failure(Some(404), "not found"));
    let sleeper = RecordingSleeper::new();
    let generator = generator_with(&client, &["a-model", "b-model"], &sleeper);
    let (canceller, signal) = cancellation();
    canceller.cancel();

    let request = GenerationRequest::flashcards("Rust", 3).with_cancellation(signal);
    let err = assert_err!(generator.generate(request).await);

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(client.get_call_count(), 0);
    assert!(sleeper.delays().is_empty());
}

/// Fires the canceller when asked to sleep, then never wakes up.
struct CancellingSleeper {
    canceller: Canceller,
    requested: RecordingSleeper,
}

#[async_trait]
impl Sleeper for CancellingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.requested.sleep(duration).await;
        self.canceller.cancel();
        std::future::pending::<()>().await;
    }
}

/// Records the call, fires the canceller, then never answers.
struct HangingService {
    canceller: Canceller,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TextGenerationService for HangingService {
    async fn generate(&self, _prompt: &str, model: &str) -> learnpath_generator::Result<String> {
        self.calls.lock().unwrap().push(model.to_string());
        self.canceller.cancel();
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_cancel_during_candidate_pause_stops_cascade() {
    let client = MockTextClient::new().with_reply(MockReply::failure(Some(404), "not found"));
    let (canceller, signal) = cancellation();
    let requested = RecordingSleeper::new();
    let generator = Generator::with_sleeper(
        Arc::new(client.clone()),
        ModelCandidates::new(None, vec!["a-model".to_string(), "b-model".to_string()]),
        GenerationSettings::default(),
        Arc::new(CancellingSleeper {
            canceller,
            requested: requested.clone(),
        }),
    );

    let request = GenerationRequest::flashcards("Rust", 3).with_cancellation(signal);
    let err = assert_err!(generator.generate(request).await);

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(client.called_models(), vec!["a-model"]);
    assert_eq!(requested.delays(), vec![Duration::from_millis(300)]);
}

#[tokio::test]
async fn test_cancel_during_retry_delay_stops_retries() {
    let client = MockTextClient::new().with_reply(MockReply::failure(Some(500), "upstream down"));
    let (canceller, signal) = cancellation();
    let requested = RecordingSleeper::new();
    let generator = Generator::with_sleeper(
        Arc::new(client.clone()),
        ModelCandidates::new(None, vec!["a-model".to_string(), "b-model".to_string()]),
        GenerationSettings::default(),
        Arc::new(CancellingSleeper {
            canceller,
            requested: requested.clone(),
        }),
    );

    let request =
        GenerationRequest::module_content("Rust Variables", false).with_cancellation(signal);
    let err = assert_err!(generator.generate(request).await);

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(client.get_call_count(), 1);
    assert_eq!(requested.delays(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_cancel_during_remote_call_stops_cascade() {
    let (canceller, signal) = cancellation();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sleeper = RecordingSleeper::new();
    let generator = Generator::with_sleeper(
        Arc::new(HangingService {
            canceller,
            calls: calls.clone(),
        }),
        ModelCandidates::new(None, vec!["a-model".to_string(), "b-model".to_string()]),
        GenerationSettings::default(),
        Arc::new(sleeper.clone()),
    );

    let request = GenerationRequest::module_list("Rust").with_cancellation(signal);
    let err = assert_err!(generator.generate(request).await);

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(*calls.lock().unwrap(), vec!["a-model".to_string()]);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_generate_returns_kind_matching_request() {
    let client = MockTextClient::new().with_response(encode(&module_titles("Jazz")));
    let sleeper = RecordingSleeper::new();

    let content = assert_ok!(
        generator_with(&client, &["gemini-2.5-flash"], &sleeper)
            .generate(GenerationRequest::module_list("Jazz"))
            .await
    );

    assert!(matches!(content, GeneratedContent::ModuleList(ref m) if m.len() == 5));
}

#[tokio::test]
async fn test_chat_reply_is_not_decoded() {
    let reply = "{\"not\": \"parsed\"} and some prose";
    let client = MockTextClient::new().with_response(reply);
    let app = App::with_services(
        Arc::new(client.clone()),
        ModelCandidates::new(None, vec!["gemini-2.5-flash".to_string()]),
        GenerationSettings::default(),
    );

    let output = assert_ok!(
        app.run(Task::Chat {
            message: "Explain JSON".to_string(),
            context: ChatContext {
                topic: Some("Web".to_string()),
                level: None,
                focus: Some("Syntax".to_string()),
            },
        })
        .await
    );

    assert_eq!(output, reply);
    let prompt = &client.prompts()[0];
    assert!(prompt.contains("Topic: Web"));
    assert!(prompt.contains("Focus: Syntax"));
}
