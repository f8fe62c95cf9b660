use crate::datamodel::MetricSample;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Where counter samples are read from.
#[async_trait]
pub trait MetricsSource: Send + Sync + Debug {
    /// Short human readable description, used in logs.
    fn name(&self) -> &str;

    /// Samples whose counter value is strictly above `min_value`, at most
    /// `limit` of them. No particular order is guaranteed.
    async fn fetch_samples(&self, min_value: f64, limit: usize) -> Result<Vec<MetricSample>>;
}
