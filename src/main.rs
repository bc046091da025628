//! lectern CLI: serve the web UI or drive the pipeline from the terminal.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use lectern::config::AppConfig;
use lectern::rag::RagEngine;
use lectern::server;

#[derive(Parser)]
#[command(
    name = "lectern",
    about = "Ask questions of a PDF library with retrieval-augmented answers",
    version
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key for the embedding/chat provider
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web UI
    Serve {
        /// Bind address, e.g. 127.0.0.1:7351
        #[arg(long)]
        bind: Option<String>,
    },

    /// Ingest PDF files into the index
    Ingest {
        /// PDF files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a question over the ingested documents
    Ask {
        /// The question to answer
        question: String,
    },

    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.api_key.is_some() {
        config.provider.api_key = cli.api_key.clone();
    }
    config.resolve_api_key_from_env();
    if config.provider.api_key.is_none() {
        config.provider.api_key = prompt_api_key()?;
    }
    anyhow::ensure!(
        config.provider.api_key.is_some(),
        "no API key: set OPENAI_API_KEY, pass --api-key, or add provider.api_key to the config file"
    );

    // The CLI keeps the index on disk so `ingest` and `ask` work across
    // invocations; the server defaults to an in-memory, session-scoped index.
    if config.index.path.is_none() && !matches!(cli.command, Command::Serve { .. }) {
        config.index.path = AppConfig::default_data_dir().map(|dir| dir.join("index.sqlite3"));
    }

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let engine = Arc::new(RagEngine::new(config)?);
            server::serve(engine, &bind).await?;
        }

        Command::Ingest { files } => {
            let engine = RagEngine::new(config)?;
            let mut failures = 0usize;
            for path in &files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                let report = match std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))
                {
                    Ok(data) => engine.ingest_pdf(&name, &data).await.map_err(anyhow::Error::from),
                    Err(e) => Err(e),
                };
                match report {
                    Ok(report) if report.skipped => {
                        println!("{name}: already indexed, skipped");
                    }
                    Ok(report) => {
                        println!("{name}: {} chunks from {} pages", report.chunks, report.pages);
                    }
                    Err(e) => {
                        failures += 1;
                        eprintln!("{name}: {e:#}");
                    }
                }
            }
            anyhow::ensure!(
                failures == 0,
                "failed to ingest {failures} of {} files",
                files.len()
            );
        }

        Command::Ask { question } => {
            let engine = RagEngine::new(config)?;
            let response = engine.answer(&question).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Plain => {
                    println!("{}", response.answer);
                    if !response.sources.is_empty() {
                        println!("\nSources:");
                        for source in &response.sources {
                            println!("- {} (page {})", source.file, source.page);
                        }
                    }
                }
            }
        }

        Command::Stats => {
            let engine = RagEngine::new(config)?;
            let stats = engine.stats().await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Plain => {
                    println!("documents:  {}", stats.documents);
                    println!("chunks:     {}", stats.chunks);
                    println!("dimensions: {}", stats.dimensions);
                }
            }
        }
    }

    Ok(())
}

/// Ask for the API key on the terminal when the environment did not provide
/// one. Returns `None` when stdin is not interactive or the answer is empty.
fn prompt_api_key() -> anyhow::Result<Option<String>> {
    if !io::stdin().is_terminal() {
        return Ok(None);
    }
    eprint!("OpenAI API key: ");
    io::stderr().flush()?;
    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim().to_string();
    Ok((!key.is_empty()).then_some(key))
}
