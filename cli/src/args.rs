//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ask questions about your notes using local models.
#[derive(Parser, Debug)]
#[command(name = "selfnotes", version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ./selfnotes.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log progress to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch every page from the content source and rebuild the index
    Index,

    /// Ask a question
    Ask {
        /// Your question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// List indexed pages
    Sources,

    /// Run the OpenAI-compatible API server
    Serve {
        /// Address to listen on, overriding the config file
        #[arg(long)]
        bind: Option<String>,
    },
}

impl Args {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match (self.verbose, &self.command) {
            (0, Command::Serve { .. }) => "info",
            (0, _) => "warn",
            (1, _) => "info",
            _ => "debug",
        }
    }
}
