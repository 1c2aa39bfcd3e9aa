//! Headless upload surface: ingest PDFs and ask questions from a terminal.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use studypal::config;
use studypal::pipeline::IngestionRequest;
use studypal::StudyPal;

#[derive(Parser)]
#[command(name = "studypal-cli", about = "Personalized learning assistant")]
struct Cli {
    /// Path to config.toml (defaults to the executable's directory or CWD).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF into the study index.
    Ingest {
        /// Path to the PDF file.
        pdf: PathBuf,
        /// What the ingestion is for.
        #[arg(long, default_value = "Extract information from the document.")]
        goal: String,
        /// Context description for the assistant.
        #[arg(long, default_value = "Study material for a learning assistant.")]
        backstory: String,
    },
    /// Ask a question against the ingested material.
    Ask {
        question: String,
        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), studypal::StudyPalError> {
    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    let app = StudyPal::from_config(&config)?;

    match cli.command {
        Command::Ingest {
            pdf,
            goal,
            backstory,
        } => {
            let pdf_bytes = std::fs::read(&pdf)?;
            let report = app
                .ingest(IngestionRequest {
                    pdf_bytes,
                    goal,
                    backstory,
                })
                .await?;
            println!(
                "ingested {} ({} pages, {} chunks) as {}",
                pdf.display(),
                report.page_count,
                report.chunk_count,
                report.doc_id
            );
        }
        Command::Ask { question, top_k } => {
            let answer = app.answer(&question, top_k).await?;
            println!("{}", answer.text);
            if answer.grounded {
                println!();
                for (i, source) in answer.sources.iter().enumerate() {
                    let preview: String = source.content.chars().take(80).collect();
                    println!("  [{}] {:.3}  {}", i + 1, source.score, preview);
                }
            } else {
                println!("\n(ungrounded: no indexed material matched)");
            }
        }
        Command::Stats => {
            let stats = app.stats().await?;
            println!(
                "{} documents, {} chunks, {} dimensions",
                stats.document_count, stats.chunk_count, stats.dimensions
            );
        }
    }

    Ok(())
}
