use scout::config::Config;
use scout::documents::{DocumentIndex, OpenAiEmbedder, VectorStore, DEFAULT_INGEST_LIMIT, DEFAULT_SEARCH_RESULTS};
use scout::loader::load_csv;
use scout::pipeline::{NoopNotifier, Notifier, Outcome};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Answers questions about tabular datasets with LLM-written SQL")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the Slack events endpoint
    Serve,
    /// Answer one question from the command line
    Ask {
        /// The question in natural language
        question: String,

        /// Print routing, SQL and the raw result as they are produced
        #[arg(long)]
        debug: bool,
    },
    /// Load CSV files into SQLite tables, replacing existing tables
    LoadCsv {
        /// SQLite database file
        #[arg(long, default_value = "student.db")]
        db: PathBuf,

        /// One or more TABLE=CSV_PATH pairs
        #[arg(required = true, value_parser = parse_table_mapping)]
        tables: Vec<(String, PathBuf)>,
    },
    /// Embed a CSV text column into the document index
    Index {
        /// CSV file to index
        #[arg(long)]
        csv: PathBuf,

        /// Column holding the document text
        #[arg(long)]
        text_column: String,

        /// Columns to keep as metadata (repeatable)
        #[arg(long = "meta")]
        metadata_columns: Vec<String>,

        /// Maximum number of rows to read
        #[arg(long, default_value_t = DEFAULT_INGEST_LIMIT)]
        limit: usize,
    },
    /// Find the documents closest to a prompt
    Search {
        #[arg(long)]
        prompt: String,

        /// Number of results
        #[arg(long, default_value_t = DEFAULT_SEARCH_RESULTS)]
        nres: usize,
    },
}

fn parse_table_mapping(raw: &str) -> std::result::Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((table, path)) if !table.trim().is_empty() && !path.trim().is_empty() => {
            Ok((table.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected TABLE=CSV_PATH, got '{}'", raw)),
    }
}

/// Prints pipeline diagnostics to stderr
struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, text: &str) {
        eprintln!("{}\n", text);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve => {
            let config = Config::from_env()?;
            scout::slack::serve(&config).await?;
            Ok(())
        }
        Commands::Ask { question, debug } => ask(question, debug).await,
        Commands::LoadCsv { db, tables } => {
            for (table, csv_path) in tables {
                let rows = load_csv(&db, &table, &csv_path)?;
                println!("{}: {} rows from {}", table, rows, csv_path.display());
            }
            Ok(())
        }
        Commands::Index {
            csv,
            text_column,
            metadata_columns,
            limit,
        } => index(csv, text_column, metadata_columns, limit).await,
        Commands::Search { prompt, nres } => search(prompt, nres).await,
    }
}

async fn ask(question: String, debug: bool) -> Result<()> {
    let config = Config::from_env()?;
    let pipeline = config.build_pipeline()?;

    let notifier: &dyn Notifier = if debug { &ConsoleNotifier } else { &NoopNotifier };
    let outcome = pipeline.run(&question, notifier).await;
    println!("{}", outcome.text());

    match outcome {
        Outcome::Answered(_) | Outcome::Rejected(_) => Ok(()),
        Outcome::RoutingFailed(_) | Outcome::ExecutionFailed(_) => Err(anyhow!("question could not be answered")),
    }
}

fn document_index(config: &Config) -> Result<DocumentIndex> {
    let embedder = OpenAiEmbedder::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.embedding_model.clone(),
    )?;
    let store = VectorStore::load_or_default(&config.vector_index_path)?;
    Ok(DocumentIndex::new(Arc::new(embedder), store))
}

async fn index(csv: PathBuf, text_column: String, metadata_columns: Vec<String>, limit: usize) -> Result<()> {
    let config = Config::from_env()?;
    let mut index = document_index(&config)?.with_persist_path(&config.vector_index_path);

    let added = index.ingest_csv(&csv, &text_column, &metadata_columns, limit).await?;

    info!(path = %config.vector_index_path.display(), "Saved document index");
    println!("Added {} documents ({} total)", added, index.store().len());
    Ok(())
}

async fn search(prompt: String, nres: usize) -> Result<()> {
    let config = Config::from_env()?;
    let index = document_index(&config)?;

    let results = index.search(&prompt, nres).await?;
    if results.is_empty() {
        println!("No documents indexed at {}", config.vector_index_path.display());
    }
    for (rank, result) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}: {}", rank + 1, result.score, result.document.id, result.document.text);
        for (key, value) in &result.document.metadata {
            println!("     {}: {}", key, value);
        }
    }
    Ok(())
}
