use anyhow::Result;
use clap::{Parser, Subcommand};
use learnpath_generator::app::{App, Task};
use learnpath_generator::models::{ChatContext, DEFAULT_ITEM_COUNT};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "learnpath-generator")]
#[command(about = "Generate learning-path content with a hosted text model")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Outline five progressive modules for a topic
    Modules { topic: String },
    /// Generate a flashcard set
    Flashcards {
        topic: String,
        #[arg(long, default_value_t = DEFAULT_ITEM_COUNT, value_parser = parse_count)]
        count: usize,
    },
    /// Generate a multiple-choice quiz
    Quiz {
        topic: String,
        #[arg(long, default_value_t = DEFAULT_ITEM_COUNT, value_parser = parse_count)]
        count: usize,
    },
    /// Generate the lesson for one module
    Content {
        module: String,
        /// Advanced rather than basic depth
        #[arg(long)]
        detailed: bool,
    },
    /// Ask a free-form tutoring question
    Chat {
        message: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        focus: Option<String>,
    },
}

impl From<Command> for Task {
    fn from(command: Command) -> Self {
        match command {
            Command::Modules { topic } => Task::Modules { topic },
            Command::Flashcards { topic, count } => Task::Flashcards { topic, count },
            Command::Quiz { topic, count } => Task::Quiz { topic, count },
            Command::Content { module, detailed } => Task::Content { module, detailed },
            Command::Chat {
                message,
                topic,
                level,
                focus,
            } => Task::Chat {
                message,
                context: ChatContext {
                    topic,
                    level,
                    focus,
                },
            },
        }
    }
}

fn parse_count(input: &str) -> std::result::Result<usize, String> {
    match input.parse::<usize>() {
        Ok(0) | Err(_) => Err(format!(
            "Invalid count '{}'. Expected a positive integer",
            input
        )),
        Ok(n) => Ok(n),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnpath_generator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting learnpath-generator");

    let args = CliArgs::parse();

    match App::new() {
        Ok(app) => match app.run(args.command.into()).await {
            Ok(output) => {
                println!("{}", output);
                info!("Generation completed successfully");
                Ok(())
            }
            Err(e) => {
                error!("Generation failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    }
}
