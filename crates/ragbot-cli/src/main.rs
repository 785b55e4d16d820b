//! ragbot CLI - Command-line interface
//!
//! Usage:
//!   ragbot chat
//!   ragbot ask <question>
//!   ragbot setup
//!   ragbot ingest <path> [--start-id N]
//!   ragbot info

mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragbot_core::config::{AppConfig, LoggingConfig};
use ragbot_core::{SetupOutcome, VectorBackend, VectorStore};
use ragbot_rag::{create_chat_client, ConversationSession, Ingestor, RagOrchestrator};
use ragbot_vector::{create_embedding_client, create_vector_store, verify_dimension};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragbot")]
#[command(about = "Knowledge-base chatbot backed by a vector database")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive conversation
    Chat,
    /// Ask a single question
    Ask {
        /// Question to ask
        question: String,
    },
    /// Create the collection and its index if missing
    Setup,
    /// Load a text file into the knowledge base
    Ingest {
        /// Path to a UTF-8 text file
        path: PathBuf,
        /// Id assigned to the first chunk
        #[arg(long, default_value_t = 0)]
        start_id: u64,
    },
    /// Show the collection schema and size
    Info,
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    Ok(create_vector_store(&config.vector, timeout).await?)
}

async fn build_orchestrator(config: &AppConfig) -> anyhow::Result<RagOrchestrator> {
    let store = connect_store(config).await?;
    if config.vector.backend == VectorBackend::Memory {
        store.ensure_collection().await?;
    }
    verify_dimension(store.as_ref(), config.vector.dimension)
        .await
        .context("vector collection does not match the embedding configuration")?;

    let embedder = create_embedding_client(&config.llm, config.vector.dimension)?;
    let chat = create_chat_client(&config.llm)?;
    Ok(
        RagOrchestrator::new(Arc::from(embedder), store, Arc::from(chat), &config.rag)
            .with_content_field(config.vector.content_field.clone()),
    )
}

async fn run_turn(rag: &RagOrchestrator, session: &mut ConversationSession, question: &str) {
    let turn = rag.respond(question).await;
    if let Some(diagnostic) = &turn.diagnostic {
        eprintln!("warning: {diagnostic}");
    }
    println!("{}\n", render::answer(&turn.answer));
    session.record_exchange(question, turn.answer);
}

async fn chat(rag: &RagOrchestrator) -> anyhow::Result<()> {
    let mut session = ConversationSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask a question. /history shows this session, /quit exits.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/history" => println!("{}\n", render::history(session.all())),
            question => run_turn(rag, &mut session, question).await,
        }
    }

    tracing::info!(turns = session.len(), "Chat session ended");
    Ok(())
}

async fn setup(config: &AppConfig) -> anyhow::Result<()> {
    let store = connect_store(config).await?;
    match store.ensure_collection().await? {
        SetupOutcome::Created => println!(
            "Created collection {} with a {} index",
            config.vector.collection, config.vector.index_type
        ),
        SetupOutcome::Existing => {
            println!("Collection {} already exists", config.vector.collection)
        }
    }
    Ok(())
}

async fn ingest(config: &AppConfig, path: &Path, start_id: u64) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let store = connect_store(config).await?;
    let embedder = create_embedding_client(&config.llm, config.vector.dimension)?;
    let ingestor = Ingestor::new(Arc::from(embedder), store, config.rag.chunk_size)
        .with_content_field(config.vector.content_field.clone());

    let report = ingestor.ingest(&source, &text, start_id).await?;
    println!(
        "Inserted {} of {} chunks from {} (next id: {})",
        report.inserted, report.chunks, source, report.next_id
    );
    Ok(())
}

async fn info(config: &AppConfig) -> anyhow::Result<()> {
    let store = connect_store(config).await?;
    match store.describe().await {
        Ok(info) => println!("{}", render::collection(&info)),
        Err(e) => {
            eprintln!("warning: {e}");
            println!(
                "Collection: {}\nSchema: Unknown\nSize: Unknown",
                config.vector.collection
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Chat => chat(&build_orchestrator(&config).await?).await?,
        Commands::Ask { question } => {
            if question.trim().is_empty() {
                anyhow::bail!("question cannot be empty");
            }
            let rag = build_orchestrator(&config).await?;
            let mut session = ConversationSession::new();
            run_turn(&rag, &mut session, &question).await;
        }
        Commands::Setup => setup(&config).await?,
        Commands::Ingest { path, start_id } => ingest(&config, &path, start_id).await?,
        Commands::Info => info(&config).await?,
    }

    Ok(())
}
