use super::{CPU_COLUMN, INSTANCE_COLUMN, MODE_COLUMN, VALUE_COLUMN};
use crate::datamodel::{CapPlanDateTimeExt, Column, ColumnValues, FeatureGrid};
use crate::error::{ForecastError, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Turns the cumulative `value` counter into a per interval rate.
///
/// Rows are stable sorted by `(timestamp, instance, cpu, mode)` and the rate
/// is the difference with the previous row of the same
/// `(instance, cpu, mode)` series. The first row of a series gets 0, as do
/// rows with an incomplete series key or a missing value on either side.
/// Counter resets give negative rates, they are kept as is.
#[derive(Debug, Clone)]
pub struct RateComputer {
    timestamp_column: String,
    rate_column: String,
}

type SeriesKey = (String, String, String);

impl RateComputer {
    pub fn new(timestamp_column: &str, rate_column: &str) -> Self {
        Self {
            timestamp_column: timestamp_column.to_string(),
            rate_column: rate_column.to_string(),
        }
    }

    pub fn compute(&self, grid: FeatureGrid) -> Result<FeatureGrid> {
        let order = self.sort_order(&grid)?;
        let mut grid = grid.take_rows(&order);

        let values = grid.require(VALUE_COLUMN)?;
        if !values.column_type().is_numeric() {
            return Err(ForecastError::ColumnType {
                column: VALUE_COLUMN.to_string(),
                expected: "numeric",
                found: values.column_type(),
            });
        }
        let instances = grid.require(INSTANCE_COLUMN)?;
        let cpus = grid.require(CPU_COLUMN)?;
        let modes = grid.require(MODE_COLUMN)?;

        let mut previous_values: HashMap<SeriesKey, Option<f64>> = HashMap::new();
        let mut negative_rates = 0_usize;
        let rates = (0..grid.n_rows())
            .map(|row| {
                let key = match (
                    instances.category_at(row),
                    cpus.category_at(row),
                    modes.category_at(row),
                ) {
                    (Some(instance), Some(cpu), Some(mode)) => (instance, cpu, mode),
                    _ => return Some(0.0),
                };
                let current = values.as_f64(row);
                let rate = match (previous_values.insert(key, current), current) {
                    (Some(Some(previous)), Some(current)) => current - previous,
                    _ => 0.0,
                };
                if rate < 0.0 {
                    negative_rates += 1;
                }
                Some(rate)
            })
            .collect::<Vec<_>>();

        debug!(
            "Computed rates for {} rows over {} series",
            rates.len(),
            previous_values.len()
        );
        if negative_rates > 0 {
            debug!(
                "{} negative rates, most likely counter resets, kept unmodified",
                negative_rates
            );
        }

        grid.set_column(Column::new(
            self.rate_column.clone(),
            ColumnValues::Float(rates),
        ))?;
        Ok(grid)
    }

    fn sort_order(&self, grid: &FeatureGrid) -> Result<Vec<usize>> {
        let timestamps = grid
            .require(&self.timestamp_column)?
            .to_datetimes()
            .into_iter()
            .map(|instant| instant.map(|instant| instant.sort_key()))
            .collect::<Vec<_>>();
        let keys = [INSTANCE_COLUMN, CPU_COLUMN, MODE_COLUMN]
            .iter()
            .map(|name| -> Result<Vec<Option<String>>> {
                let values = grid.require(name)?;
                Ok((0..grid.n_rows())
                    .map(|row| values.category_at(row))
                    .collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>>>()?;
        grid.require(VALUE_COLUMN)?;

        let mut order = (0..grid.n_rows()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| {
            missing_last(&timestamps[a], &timestamps[b])
                .then_with(|| missing_last(&keys[0][a], &keys[0][b]))
                .then_with(|| missing_last(&keys[1][a], &keys[1][b]))
                .then_with(|| missing_last(&keys[2][a], &keys[2][b]))
        });
        Ok(order)
    }
}

fn missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::MetricSample;
    use crate::features::LabelExpander;

    fn grid_of(samples: &[MetricSample]) -> FeatureGrid {
        LabelExpander::new("timestamp").expand(samples).unwrap()
    }

    fn rates(grid: &FeatureGrid) -> Vec<f64> {
        let values = grid.values("value_rate").unwrap();
        (0..grid.n_rows())
            .map(|row| values.as_f64(row).unwrap())
            .collect()
    }

    fn strings(grid: &FeatureGrid, column: &str) -> Vec<String> {
        let values = grid.values(column).unwrap();
        (0..grid.n_rows())
            .map(|row| values.category_at(row).unwrap())
            .collect()
    }

    #[test]
    fn test_single_series() {
        let samples = [10.0, 15.0, 15.0, 22.0]
            .iter()
            .enumerate()
            .map(|(i, value)| {
                MetricSample::new(format!("2024-01-01T00:0{}:00Z", i).as_str(), *value)
                    .with_entity("a", "0", "user")
            })
            .collect::<Vec<_>>();
        let grid = RateComputer::new("timestamp", "value_rate")
            .compute(grid_of(&samples))
            .unwrap();
        assert_eq!(rates(&grid), vec![0.0, 5.0, 0.0, 7.0]);
    }

    #[test]
    fn test_interleaved_series_out_of_order() {
        let samples = vec![
            MetricSample::new("2024-01-01T00:02:00Z", 30.0).with_entity("a", "0", "user"),
            MetricSample::new("2024-01-01T00:01:00Z", 100.0).with_entity("a", "0", "system"),
            MetricSample::new("2024-01-01T00:00:00Z", 10.0).with_entity("a", "0", "user"),
            MetricSample::new("2024-01-01T00:02:00Z", 104.0).with_entity("a", "0", "system"),
            MetricSample::new("2024-01-01T00:01:00Z", 12.0).with_entity("a", "0", "user"),
        ];
        let grid = RateComputer::new("timestamp", "value_rate")
            .compute(grid_of(&samples))
            .unwrap();

        assert_eq!(
            strings(&grid, "mode"),
            vec!["user", "system", "user", "system", "user"]
        );
        assert_eq!(rates(&grid), vec![0.0, 0.0, 2.0, 4.0, 18.0]);
    }

    #[test]
    fn test_counter_reset_is_negative() {
        let samples = vec![
            MetricSample::new("2024-01-01T00:00:00Z", 500.0).with_entity("a", "1", "idle"),
            MetricSample::new("2024-01-01T00:01:00Z", 3.0).with_entity("a", "1", "idle"),
        ];
        let grid = RateComputer::new("timestamp", "value_rate")
            .compute(grid_of(&samples))
            .unwrap();
        assert_eq!(rates(&grid), vec![0.0, -497.0]);
    }

    #[test]
    fn test_single_sample_series() {
        let samples =
            vec![MetricSample::new("2024-01-01T00:00:00Z", 42.0).with_entity("b", "7", "irq")];
        let grid = RateComputer::new("timestamp", "value_rate")
            .compute(grid_of(&samples))
            .unwrap();
        assert_eq!(rates(&grid), vec![0.0]);
    }

    #[test]
    fn test_incomplete_key_gets_zero() {
        let samples = vec![
            MetricSample::new("2024-01-01T00:00:00Z", 1.0),
            MetricSample::new("2024-01-01T00:01:00Z", 9.0),
        ];
        let grid = RateComputer::new("timestamp", "value_rate")
            .compute(grid_of(&samples))
            .unwrap();
        assert_eq!(rates(&grid), vec![0.0, 0.0]);
    }

    #[test]
    fn test_unparseable_timestamps_sort_last() {
        let samples = vec![
            MetricSample::new("garbage", 50.0).with_entity("a", "0", "user"),
            MetricSample::new("2024-01-01T00:00:00Z", 10.0).with_entity("a", "0", "user"),
            MetricSample::new("2024-01-01T00:01:00Z", 20.0).with_entity("a", "0", "user"),
        ];
        let grid = RateComputer::new("timestamp", "value_rate")
            .compute(grid_of(&samples))
            .unwrap();
        assert_eq!(rates(&grid), vec![0.0, 10.0, 30.0]);
        assert_eq!(grid.n_rows(), 3);
    }

    #[test]
    fn test_idempotent() {
        let samples = vec![
            MetricSample::new("2024-01-01T00:01:00Z", 7.0).with_entity("a", "0", "user"),
            MetricSample::new("2024-01-01T00:00:00Z", 3.0).with_entity("a", "0", "user"),
            MetricSample::new("2024-01-01T00:00:00Z", 8.0).with_entity("b", "0", "user"),
        ];
        let computer = RateComputer::new("timestamp", "value_rate");
        let first = computer.compute(grid_of(&samples)).unwrap();
        let second = computer.compute(grid_of(&samples)).unwrap();
        assert_eq!(rates(&first), rates(&second));
    }

    #[test]
    fn test_missing_grouping_column() {
        let mut grid = grid_of(&[MetricSample::new("2024-01-01T00:00:00Z", 1.0)]);
        grid.drop_column("cpu");
        let result = RateComputer::new("timestamp", "value_rate").compute(grid);
        assert!(matches!(
            result,
            Err(ForecastError::MissingColumn { column }) if column == "cpu"
        ));
    }

    #[test]
    fn test_non_numeric_value_column() {
        let mut grid = grid_of(&[MetricSample::new("2024-01-01T00:00:00Z", 1.0)]);
        grid.set_column(Column::new(
            "value",
            ColumnValues::String(vec![Some("1".to_string())]),
        ))
        .unwrap();
        let result = RateComputer::new("timestamp", "value_rate").compute(grid);
        assert!(matches!(result, Err(ForecastError::ColumnType { .. })));
    }
}
