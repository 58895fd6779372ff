//! # dw-cli
//!
//! Command-line interface for a draftwork store.
//!
//! Items and drafts live in one JSON file; item types and draft classes come
//! from a TOML schema document.
//! - `dw item new/set/trash/show/list` — edit items through drafting
//! - `dw draft list/show/publish/revert/deps` — review and resolve drafts

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dw_model::{DraftContext, DraftEngine, JsonFileBackend, SchemaConfig};
use tracing_subscriber::EnvFilter;

/// draftwork CLI — stage item changes as drafts, then publish or revert.
#[derive(Parser)]
#[command(name = "dw", version, about)]
struct Cli {
    /// Schema document describing item types and draft classes.
    #[arg(long, default_value = "draftwork.toml")]
    config: PathBuf,

    /// JSON file holding items and drafts.
    #[arg(long, default_value = ".draftwork/store.json")]
    data: PathBuf,

    /// Who is making the change; stored on every draft.
    #[arg(long)]
    whodunnit: Option<String>,

    /// Save and destroy directly instead of recording drafts.
    #[arg(long)]
    no_drafts: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, edit, trash, and inspect items.
    Item {
        #[command(subcommand)]
        command: commands::item::ItemCommands,
    },
    /// Review, publish, and revert drafts.
    Draft {
        #[command(subcommand)]
        command: commands::draft::DraftCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("dw_model=warn".parse()?)
                .add_directive("dw_draft=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = SchemaConfig::load(&cli.config)?;
    let mut engine = DraftEngine::from_config(&config, JsonFileBackend::new(&cli.data))?;
    tracing::debug!(config = %cli.config.display(), data = %cli.data.display(), "store opened");

    let mut ctx = if cli.no_drafts {
        DraftContext::disabled()
    } else {
        DraftContext::new()
    };
    ctx.whodunnit = cli.whodunnit;

    match &cli.command {
        Commands::Item { command } => commands::item::execute(command, &mut engine, &ctx),
        Commands::Draft { command } => commands::draft::execute(command, &mut engine),
    }
}
