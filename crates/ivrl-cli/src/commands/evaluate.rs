//! One-off evaluation command

use anyhow::Result;
use tracing::info;

use super::build_environment;
use crate::config::Config;

pub async fn run(config: Config) -> Result<()> {
    let mut env = build_environment(&config)?;
    info!("Evaluating {} test records", env.dataset().test().len());

    let summary = env.evaluate().await;
    env.flush_metrics(env.step());

    println!("Evaluation");
    println!("==========");
    for (name, value) in summary {
        println!("  {name:<32} {value:.4}");
    }
    Ok(())
}
