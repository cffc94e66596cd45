//! ivrl Bandit - Two-action policy-gradient demonstration
//!
//! A softmax policy over two arms learns, from reward alone, to prefer the
//! arm that pays.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

pub mod algorithm;
pub mod engine;
pub mod experience;
pub mod optimizer;
pub mod policy;

pub use algorithm::{PolicyAlgorithm, Reinforce};
pub use engine::{BanditConfig, BanditStats, BanditTrainer};
pub use experience::{Episode, EpisodeHistory};
pub use optimizer::{Adam, Optimizer, OptimizerKind, Sgd};
pub use policy::SoftmaxPolicy;
