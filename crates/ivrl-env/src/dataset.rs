//! Options dataset loading and train/test splitting

use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use ivrl_core::{IvrlError, MarketRecord, Result};

/// Shuffled options dataset split into train and test records
#[derive(Debug, Clone)]
pub struct Dataset {
    train: Vec<MarketRecord>,
    test: Vec<MarketRecord>,
}

impl Dataset {
    /// Load records from a CSV file, shuffle with `seed`, and hold out
    /// `test_fraction` of them for evaluation.
    pub fn load_csv(path: impl AsRef<Path>, test_fraction: f64, seed: u64) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| IvrlError::Dataset(format!("Failed to open {}: {e}", path.display())))?;

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<MarketRecord>().enumerate() {
            let record = row.map_err(|e| {
                IvrlError::Dataset(format!("{}: row {}: {e}", path.display(), line + 1))
            })?;
            records.push(record);
        }

        debug!("Read {} records from {}", records.len(), path.display());
        Self::from_records(records, test_fraction, seed)
    }

    /// Build a dataset from in-memory records
    pub fn from_records(
        mut records: Vec<MarketRecord>,
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(IvrlError::Dataset("Dataset contains no records".to_string()));
        }
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(IvrlError::Dataset(format!(
                "test_fraction must be in [0, 1), got {test_fraction}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        records.shuffle(&mut rng);

        let test_len = test_split_len(records.len(), test_fraction);
        let test = records.split_off(records.len() - test_len);

        info!(
            "Loaded dataset with {} training examples and {} test examples",
            records.len(),
            test.len()
        );

        Ok(Self {
            train: records,
            test,
        })
    }

    pub fn train(&self) -> &[MarketRecord] {
        &self.train
    }

    pub fn test(&self) -> &[MarketRecord] {
        &self.test
    }

    /// Training record for a running iteration counter, wrapping around
    pub fn train_record(&self, iter: u64) -> &MarketRecord {
        let idx = (iter % self.train.len() as u64) as usize;
        &self.train[idx]
    }
}

/// Number of held-out records: `ceil(n * fraction)`, always leaving at least
/// one training record.
fn test_split_len(n: usize, fraction: f64) -> usize {
    let wanted = (n as f64 * fraction).ceil() as usize;
    wanted.min(n.saturating_sub(1))
}
