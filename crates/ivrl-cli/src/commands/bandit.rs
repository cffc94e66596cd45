//! Bandit demo command

use anyhow::Result;
use clap::Args;

use ivrl_bandit::{BanditTrainer, OptimizerKind};

use crate::config::Config;

#[derive(Args)]
pub struct BanditArgs {
    /// Episodes to run
    #[arg(short, long)]
    episodes: Option<usize>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Optimizer: adam or sgd
    #[arg(long)]
    optimizer: Option<OptimizerKind>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f64>,
}

pub fn run(args: BanditArgs, config: Config) -> Result<()> {
    let mut bandit = config.bandit;
    if let Some(episodes) = args.episodes {
        bandit.episodes = episodes;
    }
    if let Some(seed) = args.seed {
        bandit.seed = seed;
    }
    if let Some(optimizer) = args.optimizer {
        bandit.optimizer = optimizer;
    }
    if let Some(lr) = args.lr {
        bandit.learning_rate = lr;
    }

    let stats = BanditTrainer::new(bandit)?.run()?;

    println!("Bandit results");
    println!("==============");
    println!("  algorithm:      {} ({})", stats.algorithm, stats.optimizer);
    println!("  episodes:       {}", stats.episodes);
    println!("  total reward:   {}", stats.total_reward);
    println!("  average reward: {:.3}", stats.average_reward);
    println!("  action counts:  {:?}", stats.action_counts);
    println!("  probabilities:  {:?}", stats.final_probabilities);
    Ok(())
}
