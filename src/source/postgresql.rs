use super::MetricsSource;
use crate::datamodel::{
    CapPlanDateTime, CapPlanDateTimeExt, MetricLabels, MetricLabelsExt, MetricSample,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::time::OffsetDateTime;
use sqlx::{PgPool, postgres::PgConnectOptions};
use std::str::FromStr;
use tracing::debug;

/// Reads counter samples from a `metrics` table:
///
/// ```sql
/// CREATE TABLE metrics (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     labels JSONB,
///     value DOUBLE PRECISION NOT NULL,
///     timestamp TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ DEFAULT NOW()
/// );
/// ```
#[derive(Debug)]
pub struct PostgresMetricsSource {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct MetricRow {
    name: String,
    labels: Option<serde_json::Value>,
    value: f64,
    timestamp: OffsetDateTime,
    created_at: Option<OffsetDateTime>,
}

fn to_datetime(datetime: OffsetDateTime) -> CapPlanDateTime {
    let nanoseconds = datetime.unix_timestamp_nanos();
    CapPlanDateTime::from_unix_nanoseconds_i64(
        nanoseconds.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
    )
}

impl MetricRow {
    fn into_sample(self) -> MetricSample {
        let labels = self
            .labels
            .as_ref()
            .map(MetricLabels::from_json_object)
            .unwrap_or_default();
        let mut sample = MetricSample::from_labels(to_datetime(self.timestamp), self.value, labels);
        sample.name = Some(self.name);
        sample.created_at = self.created_at.map(to_datetime);
        sample
    }
}

impl PostgresMetricsSource {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let connect_options = PgConnectOptions::from_str(connection_string)
            .context("Failed to create postgres connection options")?;

        let pool = PgPool::connect_with(connect_options)
            .await
            .context("Failed to create postgres pool")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl MetricsSource for PostgresMetricsSource {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn fetch_samples(&self, min_value: f64, limit: usize) -> Result<Vec<MetricSample>> {
        let limit = i64::try_from(limit).context("Row limit does not fit in a BIGINT")?;
        let rows: Vec<MetricRow> = sqlx::query_as(
            r#"
            SELECT name, labels, value, timestamp, created_at
            FROM metrics
            WHERE value > $1
            LIMIT $2
            "#,
        )
        .bind(min_value)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query metrics")?;

        debug!("Fetched {} metric rows from postgres", rows.len());
        Ok(rows.into_iter().map(MetricRow::into_sample).collect())
    }
}
