//! Application wiring: provider client, candidate list and generator.

use crate::ai::{GeminiTextClient, OpenAiTextClient, TextGenerationService};
use crate::generation::{GenerationSettings, Generator, ModelCandidates};
use crate::models::{AiProvider, ChatContext, Config};
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// One unit of work requested from the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Modules { topic: String },
    Flashcards { topic: String, count: usize },
    Quiz { topic: String, count: usize },
    Content { module: String, detailed: bool },
    Chat { message: String, context: ChatContext },
}

pub struct App {
    generator: Generator,
}

impl App {
    /// Build an app from concrete dependencies, mainly for tests and harnesses.
    pub fn with_services(
        service: Arc<dyn TextGenerationService>,
        candidates: ModelCandidates,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            generator: Generator::new(service, candidates, settings),
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &Config) -> Self {
        let http_client = reqwest::Client::new();

        let service: Arc<dyn TextGenerationService> = match config.provider {
            AiProvider::Gemini => {
                info!("Text provider: Gemini");
                let client = GeminiTextClient::new_with_client(
                    config.api_key.clone(),
                    config.request_timeout,
                    http_client,
                );
                match &config.base_url {
                    Some(url) => Arc::new(client.with_base_url(url.clone())),
                    None => Arc::new(client),
                }
            }
            AiProvider::OpenAi => {
                info!("Text provider: OpenAI");
                let client = OpenAiTextClient::new_with_client(
                    config.api_key.clone(),
                    config.request_timeout,
                    http_client,
                );
                match &config.base_url {
                    Some(url) => Arc::new(client.with_base_url(url.clone())),
                    None => Arc::new(client),
                }
            }
        };

        let candidates = config.candidates();
        info!("Candidate models: {:?}", candidates.as_slice());

        Self::with_services(service, candidates, GenerationSettings::default())
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Run a task and render its result: pretty JSON for structured content,
    /// the model's text for chat.
    pub async fn run(&self, task: Task) -> Result<String> {
        let output = match task {
            Task::Modules { topic } => {
                serde_json::to_string_pretty(&self.generator.module_list(&topic).await?)?
            }
            Task::Flashcards { topic, count } => {
                serde_json::to_string_pretty(&self.generator.flashcards(&topic, count).await?)?
            }
            Task::Quiz { topic, count } => {
                serde_json::to_string_pretty(&self.generator.quiz(&topic, count).await?)?
            }
            Task::Content { module, detailed } => serde_json::to_string_pretty(
                &self.generator.module_content(&module, detailed).await?,
            )?,
            Task::Chat { message, context } => self.generator.chat(&message, &context).await?,
        };
        Ok(output)
    }
}
