//! ivrl Core - Shared types, errors, and utilities
//!
//! This crate provides the foundational types used by the IV-prediction
//! environment, the bandit demo, and the CLI.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod chat;
pub mod error;
pub mod item;
pub mod market;
pub mod types;
pub mod util;

pub use chat::{ChatMessage, Role};
pub use error::{IvrlError, Result};
pub use item::{EvalOutcome, RolloutRow, ScoredGroup, TrainingItem};
pub use market::{MarketRecord, OptionType};
pub use types::*;
