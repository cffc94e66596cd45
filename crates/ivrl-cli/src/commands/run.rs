//! Training run command

use anyhow::Result;
use clap::Args;
use tracing::{debug, info, warn};

use ivrl_env::counters::encode_counters;

use super::build_environment;
use crate::config::Config;

#[derive(Args)]
pub struct RunArgs {
    /// Steps to run (defaults to the steps left until env.total_steps)
    #[arg(short, long)]
    steps: Option<u64>,
}

pub async fn run(args: RunArgs, config: Config) -> Result<()> {
    let total_steps = config.env.total_steps;
    let mut env = build_environment(&config)?;

    let steps = args
        .steps
        .unwrap_or_else(|| total_steps.saturating_sub(env.step()));
    if steps == 0 {
        info!("Nothing to do: already at step {} of {}", env.step(), total_steps);
        return Ok(());
    }

    let result = tokio::select! {
        result = env.run(steps) => Some(result),
        _ = shutdown_signal() => None,
    };

    match result {
        Some(summary) => {
            let summary = summary?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            warn!("Interrupted at step {}, saving checkpoint", env.step());
            env.save_checkpoint(env.step())?;
        }
    }

    debug!("Counters:\n{}", encode_counters());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
