//! `selfnotes`: index your notes and ask questions about them.

mod args;
mod format;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use selfnotes_retrieval::{Answer, AskError, NotesEngine, RagConfig, RetrieveError, StoreError};

use crate::args::{Args, Command};
use crate::format::{WRAP_WIDTH, banner, format_answer, format_sources, rule};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RagConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    debug!("Using store at {}", config.db_dir.display());

    match args.command {
        Command::Index => cmd_index(&config).await,
        Command::Ask { question } => cmd_ask(&config, &question.join(" ")).await,
        Command::Sources => cmd_sources(&config).await,
        Command::Serve { bind } => cmd_serve(&config, bind).await,
    }
}

async fn cmd_index(config: &RagConfig) -> Result<()> {
    let engine = NotesEngine::from_config(config)?;

    println!("\n{}\n", banner("INDEXING NOTES", '='));
    let stats = engine.index().await.context("indexing failed")?;
    info!("Index written to {}", engine.store().root().display());

    println!("{}", rule('-'));
    if stats.chunks == 0 {
        println!("No pages found.");
        println!("Make sure you've shared pages with your Notion integration.");
    } else {
        println!(
            "Done. {} chunks indexed from {} pages in {:.1}s.",
            stats.chunks,
            stats.documents,
            stats.elapsed_ms as f64 / 1000.0
        );
    }
    println!("{}\n", rule('-'));
    Ok(())
}

async fn cmd_ask(config: &RagConfig, question: &str) -> Result<()> {
    let engine = NotesEngine::from_config(config)?;

    println!("\n{}\n", banner(&format!("Q: {}", question.trim()), '='));

    let answer = fetch_answer(&engine, question).await?;

    println!("{}\n", banner("ANSWER", '-'));
    println!("{}", format_answer(&answer.text, WRAP_WIDTH));

    if !answer.sources.is_empty() {
        println!("\n{}\n", banner("SOURCES", '-'));
        print!("{}", format_sources(&answer.sources, true));
    }
    println!("{}\n", rule('='));
    Ok(())
}

/// Ask `engine`, turning a missing or empty index into a hint to run `index`.
async fn fetch_answer(engine: &NotesEngine, question: &str) -> Result<Answer> {
    match engine.ask(question).await {
        Ok(answer) => Ok(answer),
        Err(AskError::Retrieve(RetrieveError::StoreUnavailable(
            StoreError::NotFound(_) | StoreError::EmptyIndex,
        ))) => bail!("no notes indexed yet; run 'selfnotes index' first"),
        Err(e) => Err(e).context("failed to answer question"),
    }
}

async fn cmd_sources(config: &RagConfig) -> Result<()> {
    let engine = NotesEngine::from_config(config)?;

    println!("\n{}\n", banner("INDEXED PAGES", '='));

    let sources = match engine.list_sources().await {
        Ok(sources) => sources,
        Err(StoreError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e).context("failed to read the index"),
    };
    if sources.is_empty() {
        println!("No pages indexed yet.");
        println!("Run 'selfnotes index' first.\n");
        return Ok(());
    }

    println!("Total: {} pages\n", sources.len());
    println!("{}\n", rule('-'));
    print!("{}", format_sources(&sources, false));
    println!("{}\n", rule('='));
    Ok(())
}

async fn cmd_serve(config: &RagConfig, bind: Option<String>) -> Result<()> {
    let engine = NotesEngine::from_config(config)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    info!(
        "Serving {} embeddings and {} answers",
        engine.embedder().model(),
        engine.generator().model()
    );

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    selfnotes_api_server::serve(listener, Arc::new(engine))
        .await
        .context("server error")
}
