//! Vigil CLI - run condition rule sets over an object graph.
//!
//! Loads a graph document and a rule-set document (both JSON), evaluates every
//! rule once against every node, and prints the active conditions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use vigil_conditions::ConditionCategory;

mod commands;

/// Vigil CLI - Derived conditions over a JSON object graph.
#[derive(Parser, Debug)]
#[command(
    name = "vigil",
    author,
    version,
    about = "Vigil: evaluate condition rules over an object graph",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a rule set against every node and print the active conditions.
    Run {
        /// Graph document (types and nodes).
        #[arg(short, long)]
        graph: PathBuf,

        /// Rule-set document.
        #[arg(short, long)]
        rules: PathBuf,

        /// Only export these categories (can be specified multiple times).
        #[arg(short, long)]
        category: Vec<ConditionCategory>,

        /// Locale for resource-backed messages.
        #[arg(short, long)]
        locale: Option<String>,

        /// Write the conditions to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,

        /// Exit with an error when any Error condition is active.
        #[arg(long)]
        strict: bool,
    },

    /// Summarize the structure of a graph document.
    Graph {
        /// Graph document (types and nodes).
        #[arg(short, long)]
        graph: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    // Logs go to stderr so JSON on stdout stays clean.
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            graph,
            rules,
            category,
            locale,
            output,
            pretty,
            strict,
        } => {
            let options = commands::run::RunOptions {
                categories: category,
                locale,
                pretty,
                strict,
            };
            commands::run::execute(&graph, &rules, output.as_deref(), &options)?;
        }

        Commands::Graph { graph } => {
            commands::graph::execute(&graph)?;
        }
    }

    Ok(())
}
