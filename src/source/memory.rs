use super::MetricsSource;
use crate::datamodel::MetricSample;
use anyhow::Result;
use async_trait::async_trait;

/// Samples held in memory, mostly for tests and for the predict command.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsSource {
    samples: Vec<MetricSample>,
}

impl InMemoryMetricsSource {
    pub fn new(samples: Vec<MetricSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

pub(crate) fn select_samples<I>(samples: I, min_value: f64, limit: usize) -> Vec<MetricSample>
where
    I: IntoIterator<Item = MetricSample>,
{
    samples
        .into_iter()
        .filter(|sample| sample.value > min_value)
        .take(limit)
        .collect()
}

#[async_trait]
impl MetricsSource for InMemoryMetricsSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_samples(&self, min_value: f64, limit: usize) -> Result<Vec<MetricSample>> {
        Ok(select_samples(self.samples.iter().cloned(), min_value, limit))
    }
}
