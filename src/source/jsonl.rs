use super::MetricsSource;
use super::memory::select_samples;
use crate::datamodel::{
    CapPlanDateTime, CapPlanDateTimeExt, MetricLabels, MetricLabelsExt, MetricSample,
    SampleTimestamp,
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One sample per line, in the shape of a `metrics` table row:
///
/// ```json
/// {"name":"node_cpu_seconds_total","labels":{"instance":"a:9100","cpu":"0","mode":"user"},"value":1234.5,"timestamp":"2024-05-01T10:00:00Z"}
/// ```
///
/// `instance`, `cpu` and `mode` may also be given as top level fields, which
/// take precedence over the labels.
#[derive(Debug, Deserialize)]
struct JsonlRecord {
    timestamp: serde_json::Value,
    value: f64,
    #[serde(default)]
    labels: serde_json::Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    instance: Option<String>,
    #[serde(default)]
    cpu: Option<String>,
    #[serde(default)]
    mode: Option<String>,
}

impl JsonlRecord {
    fn into_sample(self) -> MetricSample {
        let timestamp = match self.timestamp {
            serde_json::Value::String(text) => SampleTimestamp::Text(text),
            serde_json::Value::Null => SampleTimestamp::Text(String::new()),
            other => SampleTimestamp::Text(other.to_string()),
        };
        let mut sample =
            MetricSample::from_labels(timestamp, self.value, MetricLabels::from_json_object(&self.labels));
        sample.instance = self.instance.or(sample.instance);
        sample.cpu = self.cpu.or(sample.cpu);
        sample.mode = self.mode.or(sample.mode);
        sample.name = self.name;
        sample.created_at = self.created_at.as_deref().and_then(|text| {
            let parsed = CapPlanDateTime::parse_timestamp(text);
            if parsed.is_none() {
                warn!("Ignoring unparseable created_at value '{}'", text);
            }
            parsed
        });
        sample
    }
}

/// Parses JSON lines into samples. Blank lines are skipped, a malformed line
/// is an error naming its line number.
pub fn parse_jsonl(content: &str) -> Result<Vec<MetricSample>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<JsonlRecord>(line)
                .map(JsonlRecord::into_sample)
                .with_context(|| format!("Invalid sample on line {}", index + 1))
        })
        .collect()
}

/// Samples stored in a JSON lines file.
#[derive(Debug, Clone)]
pub struct JsonlMetricsSource {
    path: PathBuf,
    name: String,
}

impl JsonlMetricsSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("jsonl file {}", path.display());
        Self { path, name }
    }

    /// Accepts `jsonl://<path>` and `file://<path>`.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let path = connection_string
            .strip_prefix("jsonl://")
            .or_else(|| connection_string.strip_prefix("file://"))
            .context("JSONL connection strings start with jsonl:// or file://")?;
        if path.is_empty() {
            bail!("Missing file path in connection string '{}'", connection_string);
        }
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetricsSource for JsonlMetricsSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_samples(&self, min_value: f64, limit: usize) -> Result<Vec<MetricSample>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let samples = parse_jsonl(&content)?;
        Ok(select_samples(samples, min_value, limit))
    }
}
