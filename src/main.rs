use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{error, info};

use docvek::{logging, CategoryRegistry, OpenAiEmbedder, Pipeline, Settings};

#[derive(Parser)]
#[command(name = "docvek")]
#[command(version = "0.1")]
#[command(about = "Category-partitioned document embedding store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a piece of text (read from stdin when omitted)
    AddText {
        #[arg(short, long)]
        category: String,
        text: Option<String>,
    },
    /// Extract, chunk and store .txt, .pdf, .doc/.docx and .html files
    AddFile {
        #[arg(short, long)]
        category: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the entries most similar to a query as JSON
    Search {
        #[arg(short, long)]
        category: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        query: String,
    },
    /// List categories and their entry counts
    List,
    Config,
}

fn open_pipeline(settings: &Settings) -> Result<Pipeline<OpenAiEmbedder>> {
    let api_key = settings.require_api_key()?;
    let registry = CategoryRegistry::initialize(&settings.db_dir).with_context(|| {
        format!("Failed to load categories from '{}'", settings.db_dir.display())
    })?;
    let embedder = OpenAiEmbedder::from_settings(settings, api_key)?;
    info!(model = embedder.model(), "embedding client ready");

    Ok(Pipeline::new(registry, embedder)
        .with_min_chunk_len(settings.min_chunk_len)
        .with_top_k(settings.top_k))
}

fn add_text_command(settings: &Settings, category: &str, text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut pipeline = open_pipeline(settings)?;
    let stored = pipeline.ingest_text(&text, category)?;
    if stored == 0 {
        eprintln!("Warning: text too short after sanitizing, nothing stored.");
    }
    pipeline.shutdown()?;
    Ok(())
}

fn add_file_command(settings: &Settings, category: &str, paths: &[PathBuf]) -> Result<()> {
    let mut pipeline = open_pipeline(settings)?;
    let report = pipeline.ingest_paths(paths, category);
    pipeline.shutdown()?;

    for (path, stored) in &report.ingested {
        println!("{}: {} entries", path.display(), stored);
    }
    for (path, e) in &report.failures {
        error!(path = %path.display(), error = %e, "file not ingested");
    }
    if !report.is_success() {
        anyhow::bail!(
            "{} of {} files failed",
            report.failures.len(),
            paths.len()
        );
    }
    Ok(())
}

fn search_command(settings: &Settings, category: &str, top_k: Option<usize>, query: &str) -> Result<()> {
    let requested = top_k.unwrap_or(settings.top_k);
    anyhow::ensure!(requested > 0, "--top-k must be at least 1");
    let pipeline = open_pipeline(settings)?.with_top_k(requested);
    let results = pipeline.retrieve_similar(query, category)?;

    let output = serde_json::json!({
        "query": query,
        "category": category,
        "results": results,
        "actual_results_count": results.len(),
        "requested_results_count": requested,
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn list_command(settings: &Settings) -> Result<()> {
    let registry = CategoryRegistry::initialize(&settings.db_dir)?;
    for name in registry.categories() {
        println!("{}\t{}", name, registry.len(&name));
    }
    registry.shutdown()?;
    Ok(())
}

fn config_command(settings: &Settings) -> Result<()> {
    settings.print_config();
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = Settings::load()?;
    logging::init(settings.verbose);

    match args.command {
        Commands::AddText { category, text } => add_text_command(&settings, &category, text)?,
        Commands::AddFile { category, paths } => add_file_command(&settings, &category, &paths)?,
        Commands::Search {
            category,
            top_k,
            query,
        } => search_command(&settings, &category, top_k, &query)?,
        Commands::List => list_command(&settings)?,
        Commands::Config => config_command(&settings)?,
    }
    Ok(())
}
