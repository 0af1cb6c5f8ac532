mod commands;
mod render;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use utils::Workspace;

#[derive(Parser)]
#[command(name = "plinth")]
#[command(about = "Declarative infrastructure from a KDL resource graph", long_about = None)]
struct Cli {
    /// Project file (default: plinth.kdl in the current directory)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Set a variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", global = true, value_parser = utils::parse_var)]
    vars: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes an apply would make
    Plan,
    /// Create, update and delete resources to match the project
    Apply {
        /// Execute without stopping at the plan
        #[arg(short, long)]
        yes: bool,
        /// Maximum number of resources processed concurrently
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Delete every resource recorded in state
    Destroy {
        /// Execute without stopping at the plan
        #[arg(short, long)]
        yes: bool,
    },
    /// Show exported outputs
    Output {
        /// Output name (all outputs if omitted)
        name: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the project file
    Validate,
    /// Inspect recorded state
    #[command(subcommand)]
    State(StateCommands),
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List recorded resources
    List,
    /// Show one recorded resource
    Show {
        /// Resource name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logs go to stderr; stdout carries plans and outputs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("plinth {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match run(cli).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!();
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let workspace = Workspace::load(cli.file.as_deref(), &cli.vars)?;

    match cli.command {
        Commands::Plan => commands::plan::handle(&workspace).await,
        Commands::Apply { yes, jobs } => commands::apply::handle(&workspace, yes, jobs).await,
        Commands::Destroy { yes } => commands::destroy::handle(&workspace, yes).await,
        Commands::Output { name, json } => {
            commands::output::handle(&workspace, name.as_deref(), json).await
        }
        Commands::Validate => commands::validate::handle(&workspace),
        Commands::State(StateCommands::List) => commands::state::handle_list(&workspace).await,
        Commands::State(StateCommands::Show { name }) => {
            commands::state::handle_show(&workspace, &name).await
        }
        Commands::Version => Ok(0),
    }
}
