#![allow(dead_code)]

pub mod fixtures;

use capplan::pipeline::GbdtParams;
use capplan::training::TrainingConfig;
use std::path::PathBuf;

/// Training configuration with a small ensemble, to keep tests fast.
pub fn fast_training_config() -> TrainingConfig {
    TrainingConfig {
        model: GbdtParams {
            n_estimators: 40,
            learning_rate: 0.2,
            ..GbdtParams::default()
        },
        ..TrainingConfig::default()
    }
}

/// A file path under the temporary directory, unique to this process.
pub fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("capplan-test-{}-{}", std::process::id(), name))
}
