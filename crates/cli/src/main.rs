use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use docsplit_chunker::{
    CharRatioEstimator, ChunkingConfig, ChunkingOrchestrator, ChunkingStrategy, ExtractedDocument,
    HuggingFaceCounter, StructuralMetadata, TokenCounter,
};
use settings::ConfigOverrides;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod render;
mod settings;

#[derive(Parser)]
#[command(name = "docsplit")]
#[command(about = "Token-budgeted chunking of extracted document text", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a text or markdown file into chunks
    Chunk(ChunkArgs),

    /// Count the tokens of a file
    Count(CountArgs),
}

#[derive(Args)]
struct CounterArgs {
    /// HuggingFace tokenizer.json used to count tokens
    #[arg(long, value_name = "TOKENIZER_JSON", required_unless_present = "estimate")]
    tokenizer: Option<PathBuf>,

    /// Estimate tokens from characters instead of running a tokenizer
    #[arg(long, conflicts_with = "tokenizer")]
    estimate: bool,

    /// Characters per token for --estimate and fixed-size windows
    #[arg(long)]
    chars_per_token: Option<f32>,

    /// Count special tokens (BOS/EOS, CLS/SEP) added by the tokenizer
    #[arg(long)]
    special_tokens: bool,
}

#[derive(Args)]
struct ChunkArgs {
    /// Extracted document text (markdown or plain text)
    file: PathBuf,

    #[command(flatten)]
    counter: CounterArgs,

    /// TOML file with chunking options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chunking strategy (fixed_size, recursive, hierarchical, semantic, adaptive, token_based)
    #[arg(long)]
    strategy: Option<ChunkingStrategy>,

    /// Token budget per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Tokens shared between consecutive chunks
    #[arg(long)]
    overlap: Option<usize>,

    /// Merge adjacent segments smaller than this
    #[arg(long)]
    min_segment_tokens: Option<usize>,

    /// Hard-cut words that alone exceed the budget
    #[arg(long)]
    split_oversized_words: bool,

    /// Deepest markdown heading level treated as a section boundary
    #[arg(long, default_value_t = 2)]
    heading_level: usize,

    /// Document id (defaults to the file stem)
    #[arg(long)]
    document_id: Option<String>,

    /// Page count reported by the extractor
    #[arg(long)]
    page_count: Option<u32>,

    /// The source document contains tables
    #[arg(long)]
    has_tables: bool,

    /// The source document contains images
    #[arg(long)]
    has_images: bool,

    /// Output JSON format
    #[arg(long, conflicts_with = "jsonl")]
    json: bool,

    /// Output one JSON chunk record per line
    #[arg(long)]
    jsonl: bool,

    /// Print chunking statistics
    #[arg(long)]
    stats: bool,
}

#[derive(Args)]
struct CountArgs {
    /// File to count
    file: PathBuf,

    #[command(flatten)]
    counter: CounterArgs,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    let json_output = match &cli.command {
        Commands::Chunk(args) => args.json || args.jsonl,
        Commands::Count(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // tokenizers is noisy at debug level
    if !cli.verbose {
        builder.filter_module("tokenizers", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Chunk(args) => run_chunk(args)?,
        Commands::Count(args) => run_count(args)?,
    }

    Ok(())
}

/// Chunk one extracted document
fn run_chunk(args: ChunkArgs) -> Result<()> {
    let text = read_text(&args.file)?;
    let overrides = ConfigOverrides {
        strategy: args.strategy,
        chunk_size: args.chunk_size,
        chunk_overlap: args.overlap,
        min_segment_tokens: args.min_segment_tokens,
        chars_per_token: args.counter.chars_per_token,
        split_oversized_words: args.split_oversized_words,
    };
    let config = settings::resolve_config(args.config.as_deref(), &overrides)?;

    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());
    let document_id = args.document_id.clone().unwrap_or_else(|| {
        args.file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.clone())
    });
    let document = ExtractedDocument::new(document_id, filename, text).structure(
        StructuralMetadata {
            page_count: args.page_count,
            has_tables: args.has_tables,
            has_images: args.has_images,
            extraction_method: Some("text".to_string()),
            ..Default::default()
        },
    );

    let orchestrator = build_orchestrator(config, &args.counter)?
        .with_markdown_headings(args.heading_level);
    let chunked = orchestrator
        .process(&document)
        .with_context(|| format!("Failed to chunk {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&chunked)?);
    } else if args.jsonl {
        for chunk in &chunked.chunks {
            println!("{}", serde_json::to_string(chunk)?);
        }
    } else {
        print!("{}", render::summary(&chunked));
    }

    if args.stats {
        let stats = chunked.stats();
        if json_mode(&args) {
            eprintln!("{stats}");
        } else {
            println!("{stats}");
        }
    }
    Ok(())
}

/// Count the tokens of a whole file
fn run_count(args: CountArgs) -> Result<()> {
    let text = read_text(&args.file)?;
    let chars_per_token = args
        .counter
        .chars_per_token
        .unwrap_or(CharRatioEstimator::DEFAULT_CHARS_PER_TOKEN);
    let counter = build_counter(&args.counter, chars_per_token)?;
    let tokens = counter
        .count_tokens(&text)
        .with_context(|| format!("Failed to count tokens in {}", args.file.display()))?;

    if args.json {
        let output = serde_json::json!({
            "file": args.file.display().to_string(),
            "tokens": tokens,
            "chars": text.chars().count(),
            "counter": counter.name(),
            "estimated": counter.is_estimate(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let suffix = if counter.is_estimate() { " (estimated)" } else { "" };
        println!(
            "{}: {tokens} tokens{suffix}, {} chars",
            args.file.display(),
            text.chars().count()
        );
    }
    Ok(())
}

fn json_mode(args: &ChunkArgs) -> bool {
    args.json || args.jsonl
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn build_counter(args: &CounterArgs, chars_per_token: f32) -> Result<Arc<dyn TokenCounter>> {
    if args.estimate {
        log::warn!("Estimating tokens at {chars_per_token} chars per token");
        return Ok(Arc::new(CharRatioEstimator::new(chars_per_token)));
    }
    let path = args
        .tokenizer
        .as_deref()
        .context("Either --tokenizer or --estimate is required")?;
    let counter = HuggingFaceCounter::from_file(path)
        .with_context(|| format!("Failed to load tokenizer {}", path.display()))?
        .with_special_tokens(args.special_tokens);
    log::debug!("Loaded tokenizer from {}", path.display());
    Ok(Arc::new(counter))
}

fn build_orchestrator(config: ChunkingConfig, args: &CounterArgs) -> Result<ChunkingOrchestrator> {
    if args.estimate {
        log::warn!(
            "Estimating tokens at {} chars per token; chunks are flagged as estimated",
            config.chars_per_token
        );
        return Ok(ChunkingOrchestrator::estimated(config));
    }
    let counter = build_counter(args, config.chars_per_token)?;
    Ok(ChunkingOrchestrator::new(config, counter))
}
