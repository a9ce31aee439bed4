//! OpenManus CLI entry point.
//!
//! Commands:
//! - `run`    Execute a single prompt, streaming step events to stdout
//! - `serve`  Start the HTTP API gateway

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "openmanus",
    about = "OpenManus, a general-purpose LLM task execution agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task to completion
    Run {
        /// The task prompt
        prompt: String,

        /// Override the model
        #[arg(short, long)]
        model: Option<String>,

        /// Override the step budget
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            prompt,
            model,
            max_steps,
        } => commands::run::run(prompt, model, max_steps).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
    }

    Ok(())
}
