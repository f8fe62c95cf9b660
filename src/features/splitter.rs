use crate::datamodel::FeatureGrid;
use crate::error::{ForecastError, Result};

/// Separates the predictors from the target column.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureSplitter;

impl FeatureSplitter {
    /// Returns the grid without the target column, and the target values in
    /// the same row order. Missing targets are NaN.
    pub fn split(&self, mut grid: FeatureGrid, target: &str) -> Result<(FeatureGrid, Vec<f64>)> {
        let column = grid
            .drop_column(target)
            .ok_or_else(|| ForecastError::MissingTarget {
                target: target.to_string(),
            })?;
        if !column.values.column_type().is_numeric() {
            return Err(ForecastError::ColumnType {
                column: column.name,
                expected: "numeric",
                found: column.values.column_type(),
            });
        }
        let y = (0..grid.n_rows())
            .map(|row| column.values.as_f64(row).unwrap_or(f64::NAN))
            .collect::<Vec<_>>();
        Ok((grid, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{Column, ColumnValues};

    #[test]
    fn test_split_keeps_alignment() {
        let grid = FeatureGrid::new(
            3,
            vec![
                Column::new("hour", ColumnValues::Integer(vec![Some(1), Some(2), Some(3)])),
                Column::new(
                    "value_rate",
                    ColumnValues::Float(vec![Some(10.0), None, Some(30.0)]),
                ),
            ],
        )
        .unwrap();
        let (x, y) = FeatureSplitter.split(grid, "value_rate").unwrap();
        assert_eq!(x.n_rows(), y.len());
        assert_eq!(x.column_names(), vec!["hour"]);
        assert_eq!(y[0], 10.0);
        assert!(y[1].is_nan());
        assert_eq!(y[2], 30.0);
    }

    #[test]
    fn test_split_missing_target() {
        let grid = FeatureGrid::new(
            1,
            vec![Column::new("hour", ColumnValues::Integer(vec![Some(1)]))],
        )
        .unwrap();
        assert!(matches!(
            FeatureSplitter.split(grid, "value_rate"),
            Err(ForecastError::MissingTarget { .. })
        ));
    }

    #[test]
    fn test_split_textual_target() {
        let grid = FeatureGrid::new(
            1,
            vec![Column::new(
                "value_rate",
                ColumnValues::String(vec![Some("1".to_string())]),
            )],
        )
        .unwrap();
        assert!(matches!(
            FeatureSplitter.split(grid, "value_rate"),
            Err(ForecastError::ColumnType { .. })
        ));
    }
}
