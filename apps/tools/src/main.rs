use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use shared::{
    protocol::ControlRequest,
    recipe::{Action, RecipeDefinition},
};
use souschef::{ControlPlane, HttpControlPlane};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:5000/")]
    control_url: String,
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads a recipe file and reports whether it is valid.
    Validate { recipe: PathBuf },
    /// Prints every substep in execution order.
    Outline { recipe: PathBuf },
    /// Fetches the latest telemetry snapshot.
    Meta,
    /// Posts a single command, e.g. `send set_fixed_setpoint 100` or `send quit`.
    Send {
        action: String,
        value: Option<String>,
    },
}

fn load(path: &Path) -> Result<RecipeDefinition> {
    RecipeDefinition::from_path(path).with_context(|| format!("invalid recipe {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.timeout_ms);
    let control = || HttpControlPlane::with_timeout(cli.control_url.clone(), timeout);

    match &cli.command {
        Command::Validate { recipe } => {
            let definition = load(recipe)?;
            let substeps: usize = definition.steps().map(|(_, step)| step.len()).sum();
            let reachable = definition.walk().count();
            println!(
                "{} ok: {} steps, {} substeps ({} reachable)",
                recipe.display(),
                definition.steps().count(),
                substeps,
                reachable
            );
        }
        Command::Outline { recipe } => {
            let definition = load(recipe)?;
            for (position, substep) in definition.walk() {
                let detail = match &substep.action {
                    Action::Classify { model, label } => format!("{model}:{label}"),
                    Action::SetClassifiers { value }
                    | Action::SetFixedSetpoint { value }
                    | Action::SetTemperatureTarget { value } => value.clone(),
                    Action::SetHobOff => String::new(),
                };
                println!(
                    "{:<6} {:<24} {:<20} {}",
                    position.to_string(),
                    substep.action.name(),
                    detail,
                    substep.message
                );
            }
        }
        Command::Meta => {
            let snapshot = control()?.latest_meta().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Send { action, value } => {
            let request = ControlRequest::command(action, value.clone()).ok_or_else(|| {
                anyhow!("unknown command '{action}' or wrong number of arguments")
            })?;
            control()?.send_command(&request).await?;
            println!("sent {}", request.name());
        }
    }

    Ok(())
}
