use std::sync::Arc;

use anyhow::{Result, bail};

use super::{JsonlMetricsSource, MetricsSource};

#[cfg(feature = "postgres")]
use super::PostgresMetricsSource;

pub async fn create_metrics_source(connection_string: &str) -> Result<Arc<dyn MetricsSource>> {
    Ok(match connection_string {
        #[cfg(feature = "postgres")]
        s if s.starts_with("postgres:") || s.starts_with("postgresql:") => {
            Arc::new(PostgresMetricsSource::connect(s).await?)
        }

        s if s.starts_with("jsonl:") || s.starts_with("file:") => {
            Arc::new(JsonlMetricsSource::from_connection_string(s)?)
        }

        // Provide helpful error messages for disabled sources
        #[cfg(not(feature = "postgres"))]
        s if s.starts_with("postgres:") || s.starts_with("postgresql:") => {
            bail!("PostgreSQL metrics source is not enabled. Enable with --features postgres")
        }

        _ => bail!("Unsupported metrics source: {}", connection_string),
    })
}
