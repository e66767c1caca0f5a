mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gale",
    about = "Validate chaos scenarios and inspect their scheduling behavior",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full admission check on a scenario file
    Validate {
        /// Scenario YAML file
        file: PathBuf,
    },

    /// Show the dependency graph of a scenario
    Graph {
        /// Scenario YAML file
        file: PathBuf,
    },

    /// Evaluate the firing timeline of a timeline-scheduled action
    Timeline {
        /// Scenario YAML file
        file: PathBuf,

        /// Action to evaluate (default: first action with a timeline policy)
        #[arg(long)]
        action: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Validate { file } => cmd::validate::run(&file, cli.json),
        Commands::Graph { file } => cmd::graph::run(&file, cli.json),
        Commands::Timeline { file, action } => cmd::timeline::run(&file, action.as_deref(), cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
