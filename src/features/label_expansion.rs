use super::{
    CPU_COLUMN, CREATED_AT_COLUMN, INSTANCE_COLUMN, METRIC_NAME_LABEL, MODE_COLUMN, NAME_COLUMN,
    VALUE_COLUMN,
};
use crate::datamodel::{Column, ColumnValues, FeatureGrid, MetricSample, SampleTimestamp};
use crate::error::{ForecastError, Result};
use std::collections::HashSet;
use tracing::debug;

/// Flattens sample labels into one column per label key.
///
/// The set of label columns is the union of the keys seen in the batch, in
/// first seen order. Samples lacking a key get a missing cell.
#[derive(Debug, Clone)]
pub struct LabelExpander {
    timestamp_column: String,
    dropped_labels: Vec<String>,
}

impl LabelExpander {
    pub fn new(timestamp_column: &str) -> Self {
        Self {
            timestamp_column: timestamp_column.to_string(),
            dropped_labels: vec![METRIC_NAME_LABEL.to_string()],
        }
    }

    pub fn with_dropped_label(mut self, label: &str) -> Self {
        self.dropped_labels.push(label.to_string());
        self
    }

    fn fixed_columns(&self) -> [&str; 7] {
        [
            self.timestamp_column.as_str(),
            INSTANCE_COLUMN,
            CPU_COLUMN,
            MODE_COLUMN,
            VALUE_COLUMN,
            NAME_COLUMN,
            CREATED_AT_COLUMN,
        ]
    }

    /// Schema discovery pass: label keys to allocate columns for.
    pub fn discover_label_keys(&self, samples: &[MetricSample]) -> Vec<String> {
        let fixed = self.fixed_columns();
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for sample in samples {
            for (key, _) in sample.labels.iter() {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                if self.dropped_labels.iter().any(|dropped| dropped == key) {
                    continue;
                }
                if fixed.contains(&key.as_str()) {
                    debug!("Label '{}' collides with a sample field, skipping it", key);
                    continue;
                }
                keys.push(key.clone());
            }
        }
        keys
    }

    pub fn expand(&self, samples: &[MetricSample]) -> Result<FeatureGrid> {
        if samples.is_empty() {
            return Err(ForecastError::NoRows(
                "cannot expand labels of an empty sample set".to_string(),
            ));
        }
        let n_rows = samples.len();
        let label_keys = self.discover_label_keys(samples);
        debug!(
            "Expanding {} samples with {} label columns",
            n_rows,
            label_keys.len()
        );

        let mut columns = Vec::with_capacity(label_keys.len() + 7);
        columns.push(Column::new(
            self.timestamp_column.clone(),
            timestamp_values(samples),
        ));
        columns.push(Column::new(
            INSTANCE_COLUMN,
            ColumnValues::String(samples.iter().map(|s| s.instance.clone()).collect()),
        ));
        columns.push(Column::new(
            CPU_COLUMN,
            ColumnValues::String(samples.iter().map(|s| s.cpu.clone()).collect()),
        ));
        columns.push(Column::new(
            MODE_COLUMN,
            ColumnValues::String(samples.iter().map(|s| s.mode.clone()).collect()),
        ));
        columns.push(Column::new(
            VALUE_COLUMN,
            ColumnValues::Float(samples.iter().map(|s| Some(s.value)).collect()),
        ));
        if samples.iter().any(|s| s.name.is_some()) {
            columns.push(Column::new(
                NAME_COLUMN,
                ColumnValues::String(samples.iter().map(|s| s.name.clone()).collect()),
            ));
        }
        if samples.iter().any(|s| s.created_at.is_some()) {
            columns.push(Column::new(
                CREATED_AT_COLUMN,
                ColumnValues::DateTime(samples.iter().map(|s| s.created_at).collect()),
            ));
        }

        for key in label_keys {
            let values = samples
                .iter()
                .map(|sample| {
                    sample
                        .labels
                        .iter()
                        .find(|(label_key, _)| *label_key == key)
                        .map(|(_, value)| value.clone())
                })
                .collect();
            columns.push(Column::new(key, ColumnValues::String(values)));
        }

        FeatureGrid::new(n_rows, columns)
    }
}

// DateTime when every sample carries an instant, text otherwise so that
// unparsed values survive until time feature expansion.
fn timestamp_values(samples: &[MetricSample]) -> ColumnValues {
    let instants: Option<Vec<_>> = samples
        .iter()
        .map(|sample| match &sample.timestamp {
            SampleTimestamp::Instant(instant) => Some(Some(*instant)),
            SampleTimestamp::Text(_) => None,
        })
        .collect();
    match instants {
        Some(instants) => ColumnValues::DateTime(instants),
        None => ColumnValues::String(
            samples
                .iter()
                .map(|sample| Some(sample.timestamp.render()))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{CapPlanDateTime, CapPlanDateTimeExt, ColumnType};

    fn samples() -> Vec<MetricSample> {
        vec![
            MetricSample::new("2024-01-01T00:00:00Z", 10.0)
                .with_entity("a", "0", "user")
                .with_label("__name__", "node_cpu_seconds_total")
                .with_label("job", "node"),
            MetricSample::new("2024-01-01T00:01:00Z", 12.0)
                .with_entity("a", "0", "user")
                .with_label("__name__", "node_cpu_seconds_total")
                .with_label("region", "eu"),
        ]
    }

    #[test]
    fn test_union_of_label_keys() {
        let grid = LabelExpander::new("timestamp").expand(&samples()).unwrap();
        assert_eq!(
            grid.column_names(),
            vec!["timestamp", "instance", "cpu", "mode", "value", "job", "region"]
        );
        assert_eq!(
            grid.values("job"),
            Some(&ColumnValues::String(vec![Some("node".to_string()), None]))
        );
        assert_eq!(
            grid.values("region"),
            Some(&ColumnValues::String(vec![None, Some("eu".to_string())]))
        );
    }

    #[test]
    fn test_metric_name_label_is_dropped() {
        let grid = LabelExpander::new("timestamp").expand(&samples()).unwrap();
        assert!(!grid.contains("__name__"));
    }

    #[test]
    fn test_extra_dropped_label() {
        let grid = LabelExpander::new("timestamp")
            .with_dropped_label("job")
            .expand(&samples())
            .unwrap();
        assert!(!grid.contains("job"));
        assert!(grid.contains("region"));
    }

    #[test]
    fn test_colliding_label_is_skipped() {
        let samples = vec![
            MetricSample::new("2024-01-01T00:00:00Z", 10.0)
                .with_entity("a", "0", "user")
                .with_label("value", "shadow"),
        ];
        let grid = LabelExpander::new("timestamp").expand(&samples).unwrap();
        assert_eq!(grid.values("value").unwrap().column_type(), ColumnType::Float);
        assert_eq!(grid.n_columns(), 5);
    }

    #[test]
    fn test_timestamp_column_type() {
        let text_grid = LabelExpander::new("timestamp").expand(&samples()).unwrap();
        assert_eq!(
            text_grid.values("timestamp").unwrap().column_type(),
            ColumnType::String
        );

        let instant_samples = vec![MetricSample::new(
            CapPlanDateTime::from_unix_seconds_i64(1_704_067_200),
            1.0,
        )];
        let instant_grid = LabelExpander::new("timestamp")
            .expand(&instant_samples)
            .unwrap();
        assert_eq!(
            instant_grid.values("timestamp").unwrap().column_type(),
            ColumnType::DateTime
        );
    }

    #[test]
    fn test_optional_store_columns() {
        let samples = vec![
            MetricSample::new("2024-01-01T00:00:00Z", 10.0)
                .with_name("node_cpu_seconds_total")
                .with_created_at(CapPlanDateTime::from_unix_seconds_i64(1_704_067_260)),
        ];
        let grid = LabelExpander::new("timestamp").expand(&samples).unwrap();
        assert!(grid.contains("name"));
        assert_eq!(
            grid.values("created_at").unwrap().column_type(),
            ColumnType::DateTime
        );
    }

    #[test]
    fn test_empty_batch_is_fatal() {
        let result = LabelExpander::new("timestamp").expand(&[]);
        assert!(matches!(result, Err(ForecastError::NoRows(_))));
    }
}
