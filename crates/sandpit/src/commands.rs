//! Command implementation

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use sandpit_agent::{AgentLoop, AgentOutcome, Sandbox, ToolRegistry};
use sandpit_config::{load_dotenv, Config};
use sandpit_provider::GeminiProvider;

/// Run one prompt through the agent. Returns the process exit code.
pub async fn run_command(prompt: &str, verbose: bool) -> Result<i32> {
    load_dotenv();

    let config = Config::load()
        .await
        .context("Failed to load configuration")?;
    let api_key = config.api_key()?;

    let root = config
        .working_directory()
        .context("Failed to resolve working directory")?;
    let sandbox = Sandbox::new(&root)
        .with_context(|| format!("Invalid working directory {:?}", root))?;
    info!("working directory: {:?}", sandbox.root());

    let model = config.model().to_string();
    let provider = GeminiProvider::new(api_key, config.api_base(), Some(model.clone()));
    let tools = ToolRegistry::with_script_timeout(
        sandbox,
        Duration::from_secs(config.script_timeout_secs()),
    );
    let agent = AgentLoop::new(provider, tools, model, config.max_iterations()).verbose(verbose);

    if verbose {
        println!("User prompt: {}", prompt);
    }

    let run = agent.run(prompt).await;
    info!(
        "{} model calls, {} turns",
        run.model_calls,
        run.conversation.turns().len()
    );

    report(&run.outcome);
    Ok(run.outcome.exit_code())
}

fn report(outcome: &AgentOutcome) {
    match outcome {
        AgentOutcome::Done(text) => {
            println!("Response:");
            println!("{}", text);
        }
        AgentOutcome::RateLimited(message) => {
            eprintln!("Stopped: {}", message);
        }
        AgentOutcome::Failed(message) => {
            eprintln!("Error: {}", message);
        }
        AgentOutcome::BudgetExhausted { iterations } => {
            eprintln!(
                "Error: no final response after {} iterations",
                iterations
            );
        }
    }
}
