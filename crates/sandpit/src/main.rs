//! Sandpit - a sandboxed AI coding assistant

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::run_command;

/// Sandpit - AI coding assistant for your terminal
#[derive(Parser)]
#[command(name = "sandpit")]
#[command(about = "A sandboxed AI coding assistant")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// What you want the agent to do
    prompt: String,

    /// Show token usage and every tool call with its result
    #[arg(long)]
    verbose: bool,
}

const VERBOSE_FILTER: &str =
    "warn,sandpit=debug,sandpit_agent=debug,sandpit_provider=debug,sandpit_config=debug";

fn init_tracing(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_command(&cli.prompt, cli.verbose).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
