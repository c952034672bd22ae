use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clipdex::config::State;
use clipdex::embedder::{Embedder, LookupEmbedder};
use clipdex::error::ClipdexError;
use clipdex::gate::ConfidenceGate;
use clipdex::heuristics::{analyze_wav, classify_brightness, mean_brightness};
use clipdex::index::{discover_items, Index};
use clipdex::ranker::rank;
use clipdex::report::{self, FileStatus};
use clipdex::vector_entry::QueryEntry;
use clipdex::vector_ops::Vector;

#[derive(Parser)]
#[command(name = "clipdex")]
#[command(version = "0.1")]
#[command(about = "Text-to-image retrieval over precomputed embeddings", long_about = None)]
struct Cli {
    /// Print instructions for preparing inputs and exit
    #[arg(long)]
    setup_info: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed every image in a directory and save the index
    Index {
        dir: PathBuf,
        /// Base path for the .vec/.txt pair (defaults to the configured index path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rank indexed images against text queries
    Search {
        queries: Vec<String>,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Emit one JSON object per query
        #[arg(long)]
        json: bool,
        /// Read raw {"label", "vector"} query lines from stdin
        #[arg(long)]
        stdin: bool,
    },
    /// Print indexed identifiers in index order
    List,
    /// Report RMS-energy quality for WAV clips
    Audio { files: Vec<PathBuf> },
    /// Report brightness confidence for images before trusting a caption
    CaptionCheck { images: Vec<PathBuf> },
    /// Print the resolved configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "clipdex=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_embedder(state: &State) -> Result<LookupEmbedder> {
    LookupEmbedder::open(&state.embeddings_path)
        .with_context(|| format!("Failed to load embeddings from '{}'", state.embeddings_path))
}

fn index_command(state: &State, dir: &Path, output: Option<&Path>) -> Result<()> {
    let embedder = open_embedder(state)?;
    let items = discover_items(dir, &state.image_extensions)
        .with_context(|| format!("Failed to scan '{}'", dir.display()))?;
    println!("Indexing {} images...", items.len());

    let index = if state.workers > 1 {
        Index::build_parallel(&items, |path| embedder.encode_image(path), state.workers)?
    } else {
        Index::build(&items, |path| embedder.encode_image(path))?
    };

    for id in index.ids() {
        println!("Indexed: {}", report::display_name(id));
    }

    let base = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&state.index_path));
    index
        .save(&base)
        .with_context(|| format!("Failed to save index to '{}'", base.display()))?;

    println!(
        "[OK] Indexing complete. {} images ready for search.",
        index.len()
    );
    Ok(())
}

fn load_index(state: &State) -> Result<Index> {
    Index::load(&state.index_path)
        .with_context(|| format!("Failed to load index '{}'", state.index_path))
}

fn search_command(
    state: &State,
    queries: &[String],
    top_k: usize,
    gate: &ConfidenceGate,
    json: bool,
    from_stdin: bool,
) -> Result<()> {
    let index = load_index(state)?;

    let encoded: Vec<(String, Vector)> = if from_stdin {
        let stdin = io::stdin();
        let mut encoded = Vec::new();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: QueryEntry =
                serde_json::from_str(&line).context("Failed to parse JSON input")?;
            encoded.push((entry.label, Vector::new(entry.vector)));
        }
        encoded
    } else {
        if queries.is_empty() {
            anyhow::bail!("No queries given. Pass query text or use --stdin.");
        }
        let embedder = open_embedder(state)?;
        queries
            .iter()
            .map(|q| Ok((q.clone(), embedder.encode_text(q)?)))
            .collect::<Result<Vec<_>>>()?
    };

    for (query, vector) in &encoded {
        let ranked = rank(vector, &index, top_k)?;
        let decision = gate.evaluate(&ranked)?;
        info!(query = %query, accepted = decision.accepted, "Search complete");

        if json {
            let output = report::search_json(query, index.len(), top_k, &decision);
            println!("{}", serde_json::to_string(&output)?);
            continue;
        }

        println!("{}", "-".repeat(60));
        if decision.accepted {
            print!("{}", report::format_ranked(query, &decision.shown));
        } else {
            println!("Query: \"{}\"", query);
            print!("{}", report::format_fallback(&decision));
        }
    }
    Ok(())
}

fn list_command(state: &State) -> Result<()> {
    let index = load_index(state)?;
    for id in index.ids() {
        println!("{}", id);
    }
    Ok(())
}

fn file_label(path: &Path) -> String {
    report::display_name(&path.to_string_lossy()).to_string()
}

/// Fails the run once every file has had its turn, if any of them could not be read.
fn finish_batch(summary: &[(String, FileStatus)]) -> Result<()> {
    print!("{}", report::format_summary(summary));
    let failed = summary
        .iter()
        .filter(|(_, status)| matches!(status, FileStatus::Failed(_)))
        .count();
    if failed > 0 {
        anyhow::bail!("{} of {} files could not be processed", failed, summary.len());
    }
    Ok(())
}

fn audio_command(state: &State, files: &[PathBuf]) -> Result<()> {
    let mut summary = Vec::with_capacity(files.len());
    for path in files {
        let name = file_label(path);
        let status = match analyze_wav(path, &state.audio) {
            Ok(analysis) => {
                print!("{}", report::format_audio(&name, &analysis));
                FileStatus::Analyzed(format!("{} quality", analysis.quality))
            }
            Err(ClipdexError::InputNotFound(missing)) => {
                warn!(path = %missing.display(), "Audio file not found");
                println!("Audio file not found: {}. Skipping...", missing.display());
                FileStatus::Missing
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Audio analysis failed");
                println!("Error: {}: {}. Skipping this file...", name, e);
                FileStatus::Failed(e.to_string())
            }
        };
        summary.push((name, status));
    }
    finish_batch(&summary)
}

fn caption_check_command(state: &State, images: &[PathBuf]) -> Result<()> {
    let mut summary = Vec::with_capacity(images.len());
    for path in images {
        let name = file_label(path);
        let status = match mean_brightness(path) {
            Ok(mean) => {
                let confidence = classify_brightness(mean, state.brightness_threshold);
                print!("{}", report::format_brightness(&name, mean, confidence));
                FileStatus::Analyzed(format!("{} confidence", confidence))
            }
            Err(ClipdexError::InputNotFound(missing)) => {
                warn!(path = %missing.display(), "Image not found");
                println!("Image not found: {}. Skipping...", missing.display());
                FileStatus::Missing
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Brightness check failed");
                println!("Error: {}: {}. Skipping this file...", name, e);
                FileStatus::Failed(e.to_string())
            }
        };
        summary.push((name, status));
    }
    finish_batch(&summary)
}

fn config_command(state: &State) -> Result<()> {
    state.print_config();
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if args.setup_info {
        print!("{}", report::SETUP_INFO);
        return Ok(());
    }

    let Some(command) = args.command else {
        anyhow::bail!("No command given. Run with --help for usage or --setup-info for setup.");
    };

    let state = State::new()?;

    match command {
        Commands::Index { dir, output } => index_command(&state, &dir, output.as_deref())?,
        Commands::Search {
            queries,
            top_k,
            threshold,
            json,
            stdin,
        } => {
            let top_k = top_k.unwrap_or(state.top_k);
            let gate = ConfidenceGate::new(threshold.unwrap_or(state.threshold))?;
            search_command(&state, &queries, top_k, &gate, json, stdin)?
        }
        Commands::List => list_command(&state)?,
        Commands::Audio { files } => audio_command(&state, &files)?,
        Commands::CaptionCheck { images } => caption_check_command(&state, &images)?,
        Commands::Config => config_command(&state)?,
    }
    Ok(())
}
