use crate::pipeline::CapacityPipeline;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedPipeline {
    format_version: u32,
    pipeline: CapacityPipeline,
}

/// Writes a fitted pipeline as JSON.
pub fn save_pipeline(pipeline: &CapacityPipeline, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let persisted = PersistedPipeline {
        format_version: FORMAT_VERSION,
        pipeline: pipeline.clone(),
    };
    let json = serde_json::to_vec(&persisted).context("Failed to serialise pipeline")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write model to {}", path.display()))?;
    info!("Model saved to {}", path.display());
    Ok(())
}

pub fn load_pipeline(path: impl AsRef<Path>) -> Result<CapacityPipeline> {
    let path = path.as_ref();
    let json = std::fs::read(path)
        .with_context(|| format!("Failed to read model from {}", path.display()))?;
    let persisted: PersistedPipeline = serde_json::from_slice(&json)
        .with_context(|| format!("{} is not a saved pipeline", path.display()))?;
    if persisted.format_version != FORMAT_VERSION {
        bail!(
            "Unsupported model format version {} in {}, expected {}",
            persisted.format_version,
            path.display(),
            FORMAT_VERSION
        );
    }
    Ok(persisted.pipeline)
}
