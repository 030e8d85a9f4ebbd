//! Jarvis - personal voice/text assistant
//!
//! Relays user utterances to a chat-completion backend, runs the tools the
//! backend asks for, and answers through the console or an HTTP API.

mod api;
mod config;
mod conversation;
mod llm;
mod memory;
mod repl;
mod speech;
mod system_prompt;
mod tools;
mod transcript;

use api::{create_router, AppState};
use clap::{Parser, Subcommand};
use config::AssistantConfig;
use conversation::ConversationEngine;
use llm::{LlmService, LoggingService, OpenAIService, UnconfiguredService};
use memory::{MemoryStore, SharedMemory};
use speech::ConsoleIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tools::ToolRegistry;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcript::TranscriptLog;

const DEFAULT_LOG_FILTER: &str = "jarvis=info,tower_http=info";

#[derive(Parser)]
#[command(name = "jarvis", about = "Jarvis personal AI assistant", version)]
struct Cli {
    /// Listen for the wake word instead of treating every line as a command
    #[arg(long, short)]
    voice: bool,

    /// Without a subcommand, starts an interactive session
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and browser UI
    Serve {
        /// Port to listen on (overrides `JARVIS_PORT`)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_file = dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.command.is_some());
    if let Some(path) = &env_file {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = AssistantConfig::from_env();
    let store = MemoryStore::open(&config.memory_file);
    tracing::info!(
        path = %store.path().display(),
        facts = store.all_facts().len(),
        interactions = store.history().len(),
        "Memory loaded"
    );
    let memory = store.into_shared();
    let engine = Arc::new(build_engine(&config, &memory));

    tracing::info!(
        tools = engine.tools().len(),
        window = engine.config().window,
        max_iterations = engine.config().max_iterations,
        "Assistant ready"
    );

    match cli.command {
        Some(Command::Serve { port }) => {
            serve(&config, engine, memory, port.unwrap_or(config.port)).await?;
        }
        None if cli.voice => {
            let mut io = ConsoleIo::stdio();
            repl::run_voice(&mut io, &engine, &memory, &config.wake_word).await;
        }
        None => {
            let mut io = ConsoleIo::stdio();
            repl::run(&mut io, &engine, &memory, &config.wake_word).await;
        }
    }

    Ok(())
}

/// JSON logs for the server; compact human-readable logs on stderr otherwise
fn init_tracing(serving: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    if serving {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn build_engine(config: &AssistantConfig, memory: &SharedMemory) -> ConversationEngine {
    let llm: Arc<dyn LlmService> = match &config.api_key {
        Some(key) => {
            tracing::info!(model = %config.model, base_url = %config.base_url(), "Using OpenAI-compatible backend");
            let service = OpenAIService::new(
                key.clone(),
                config.model.clone(),
                config.base_url(),
                config.request_timeout,
            );
            Arc::new(LoggingService::new(Arc::new(service)))
        }
        None => {
            tracing::warn!("No API key configured. Set OPENAI_API_KEY.");
            Arc::new(UnconfiguredService::new(config.model.clone()))
        }
    };

    let tools = ToolRegistry::standard(memory.clone(), config.request_timeout);
    ConversationEngine::new(llm, Arc::new(tools)).with_config(config.engine_config())
}

async fn serve(
    config: &AssistantConfig,
    engine: Arc<ConversationEngine>,
    memory: SharedMemory,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let transcript = TranscriptLog::open(&config.history_file);
    let state = AppState::new(engine, memory, transcript);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state, &config.ui_dir)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, ui_dir = %config.ui_dir.display(), "Jarvis server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
