use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use hoopla::handlers::{
    AnswerArgs, BuildArgs, ChunkArgs, ChunkSentencesArgs, ClearArgs, CommandHandlers, EmbedArgs,
    EvaluateArgs, KeywordArgs, NormalizeArgs, RrfArgs, SemanticArgs, StatusArgs, TermStatsArgs,
    WeightedArgs,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hoopla", version, about = "Keyword, semantic and hybrid search over a movie corpus")]
struct Cli {
    /// Configuration file (TOML or JSON) layered over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print structured JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build and persist the keyword and semantic indices
    Build(BuildArgs),
    /// Report whether persisted indices are present and current
    Status(StatusArgs),
    /// Delete the persisted indices
    Clear(ClearArgs),
    /// BM25 keyword search
    Keyword(KeywordArgs),
    /// Term frequency, IDF and BM25 components for one term
    TermStats(TermStatsArgs),
    /// Chunked embedding search
    Semantic(SemanticArgs),
    /// Split text into overlapping word windows
    Chunk(ChunkArgs),
    /// Split text into overlapping sentence windows
    ChunkSentences(ChunkSentencesArgs),
    /// Embed text with the configured provider
    Embed(EmbedArgs),
    /// Min-max normalize a list of scores
    Normalize(NormalizeArgs),
    /// Hybrid search blending normalized scores with alpha
    #[command(alias = "weighted-search")]
    Weighted(WeightedArgs),
    /// Hybrid search with Reciprocal Rank Fusion
    #[command(alias = "rrf-search")]
    Rrf(RrfArgs),
    /// Precision, recall and F1 against the golden dataset
    Evaluate(EvaluateArgs),
    /// Answer a query from retrieved documents with the LLM
    Answer(AnswerArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::InvalidSubcommand => {
            Cli::command().print_help()?;
            return Ok(());
        }
        Err(e) => e.exit(),
    };

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = hoopla::Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let handlers = CommandHandlers::new(config);
    let output = match command {
        Command::Build(args) => handlers.handle_build(args).await,
        Command::Status(args) => handlers.handle_status(args).await,
        Command::Clear(args) => handlers.handle_clear(args).await,
        Command::Keyword(args) => handlers.handle_keyword(args).await,
        Command::TermStats(args) => handlers.handle_term_stats(args).await,
        Command::Semantic(args) => handlers.handle_semantic(args).await,
        Command::Chunk(args) => handlers.handle_chunk(args).await,
        Command::ChunkSentences(args) => handlers.handle_chunk_sentences(args).await,
        Command::Embed(args) => handlers.handle_embed(args).await,
        Command::Normalize(args) => handlers.handle_normalize(args).await,
        Command::Weighted(args) => handlers.handle_weighted(args).await,
        Command::Rrf(args) => handlers.handle_rrf(args).await,
        Command::Evaluate(args) => handlers.handle_evaluate(args).await,
        Command::Answer(args) => handlers.handle_answer(args).await,
    }?;

    println!("{}", hoopla::handlers::render(&output, cli.json)?);
    Ok(())
}
