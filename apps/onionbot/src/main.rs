use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use shared::recipe::RecipeDefinition;
use souschef::{DisplayState, HttpControlPlane, Phase, SousChef};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(about = "Runs a recipe against the onionbot control service")]
struct Args {
    /// Base URL of the control service.
    #[arg(long)]
    control_url: Option<String>,
    /// Recipe file, TOML or JSON.
    #[arg(long)]
    recipe: Option<PathBuf>,
    #[arg(long)]
    tick_ms: Option<u64>,
    #[arg(long)]
    settle_factor: Option<f64>,
    #[arg(long)]
    request_timeout_ms: Option<u64>,
}

impl Args {
    fn apply(self, settings: &mut config::Settings) {
        if let Some(v) = self.control_url {
            settings.control_url = v;
        }
        if let Some(v) = self.recipe {
            settings.recipe_path = v;
        }
        if let Some(v) = self.tick_ms {
            settings.tick_ms = v;
        }
        if let Some(v) = self.settle_factor {
            settings.settle_factor = v;
        }
        if let Some(v) = self.request_timeout_ms {
            settings.request_timeout_ms = v;
        }
    }
}

enum OperatorCommand {
    Next,
    Previous,
    Stop,
}

fn parse_command(line: &str) -> Option<OperatorCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "n" | "next" => Some(OperatorCommand::Next),
        "p" | "prev" | "previous" => Some(OperatorCommand::Previous),
        "q" | "stop" | "quit" => Some(OperatorCommand::Stop),
        _ => None,
    }
}

fn print_display(display: &DisplayState) {
    println!("  previous: {}", display.previous_message);
    println!("> current:  {}", display.current_message);
    println!("  next:     {}", display.next_message);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut settings = config::load_settings();
    Args::parse().apply(&mut settings);
    config::validate(&settings)?;

    let control_url = config::prepare_control_url(&settings.control_url)?;
    let recipe = RecipeDefinition::from_path(&settings.recipe_path)
        .with_context(|| format!("failed to load recipe {}", settings.recipe_path.display()))?;
    let control = HttpControlPlane::with_timeout(control_url.clone(), settings.request_timeout())?;
    info!(
        control_url = %control_url,
        recipe = %settings.recipe_path.display(),
        "starting onionbot"
    );

    let chef = SousChef::new(recipe, Arc::new(control), settings.engine_config());
    let mut display = chef.subscribe_display();
    let mut state = chef.subscribe();
    print_display(&display.borrow_and_update());

    chef.run()?;
    println!("commands: n(ext), p(revious), q(uit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(OperatorCommand::Next) => {
                        chef.next();
                    }
                    Some(OperatorCommand::Previous) => {
                        chef.previous();
                    }
                    Some(OperatorCommand::Stop) => break,
                    None if line.trim().is_empty() => {}
                    None => println!("unknown command '{}'", line.trim()),
                },
                Ok(None) => stdin_open = false,
                Err(error) => {
                    warn!("stdin read failed, operator input disabled: {error}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => {
                info!("ctrl-c received");
                break;
            }
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                print_display(&display.borrow_and_update());
            }
            changed = state.changed() => {
                if changed.is_err() || state.borrow_and_update().phase == Phase::Complete {
                    break;
                }
            }
        }
    }

    let final_state = chef.stop().await?;
    print_display(&chef.display());
    info!(state = ?final_state, "onionbot finished");
    Ok(())
}
