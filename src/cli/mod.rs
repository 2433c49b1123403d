//! CLI module for deepsearch
//!
//! Provides command-line interface parsing for the deepsearch binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// deepsearch - Iterative deep research from the command line
///
/// Answers a question by alternating web searches and model decisions until
/// the model is ready to answer or the step budget runs out.
#[derive(Parser, Debug)]
#[command(
    name = "deepsearch",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "deepsearch - Iterative deep research agent",
    long_about = "Answers questions by researching the web in a bounded loop: each step either\n\
                  runs a search (whose top results are crawled and summarized concurrently)\n\
                  or writes the answer, which is streamed to stdout.",
    after_help = "EXAMPLES:\n    \
                  deepsearch ask \"What changed in Rust 1.80?\"\n    \
                  deepsearch ask --step-budget 3 \"Is tokio faster than async-std?\"\n    \
                  deepsearch config --validate\n    \
                  deepsearch --config my.toml ask \"...\""
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "deepsearch.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and stream the answer
    Ask {
        /// The question to research
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Maximum number of research steps (overrides the config file)
        #[arg(long)]
        step_budget: Option<u32>,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
