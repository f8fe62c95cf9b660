use super::{CapPlanDateTime, CapPlanDateTimeExt};
use crate::error::{ForecastError, Result};
use std::fmt;

/// Runtime type of a grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    DateTime,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::String => "String",
            ColumnType::Boolean => "Boolean",
            ColumnType::DateTime => "DateTime",
        };
        write!(f, "{}", name)
    }
}

/// Values of one column. Every cell may be missing.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
    DateTime(Vec<Option<CapPlanDateTime>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Integer(values) => values.len(),
            ColumnValues::Float(values) => values.len(),
            ColumnValues::String(values) => values.len(),
            ColumnValues::Boolean(values) => values.len(),
            ColumnValues::DateTime(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValues::Integer(_) => ColumnType::Integer,
            ColumnValues::Float(_) => ColumnType::Float,
            ColumnValues::String(_) => ColumnType::String,
            ColumnValues::Boolean(_) => ColumnType::Boolean,
            ColumnValues::DateTime(_) => ColumnType::DateTime,
        }
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnValues::Integer(values) => values[row].is_none(),
            ColumnValues::Float(values) => values[row].is_none_or(|value| value.is_nan()),
            ColumnValues::String(values) => values[row].is_none(),
            ColumnValues::Boolean(values) => values[row].is_none(),
            ColumnValues::DateTime(values) => values[row].is_none(),
        }
    }

    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&row| self.is_missing(row)).count()
    }

    /// Numeric reading of a cell, `None` when missing or not numeric.
    pub fn as_f64(&self, row: usize) -> Option<f64> {
        match self {
            ColumnValues::Integer(values) => values[row].map(|value| value as f64),
            ColumnValues::Float(values) => values[row].filter(|value| !value.is_nan()),
            _ => None,
        }
    }

    /// Text form of a cell, used for grouping keys and category levels.
    pub fn category_at(&self, row: usize) -> Option<String> {
        match self {
            ColumnValues::Integer(values) => values[row].map(|value| value.to_string()),
            ColumnValues::Float(values) => values[row]
                .filter(|value| !value.is_nan())
                .map(|value| value.to_string()),
            ColumnValues::String(values) => values[row].clone(),
            ColumnValues::Boolean(values) => values[row].map(|value| value.to_string()),
            ColumnValues::DateTime(values) => values[row].map(|value| value.to_rfc3339()),
        }
    }

    /// Coerces the column into instants. Cells that cannot be read as an
    /// instant become missing. Numbers are taken as Unix seconds.
    pub fn to_datetimes(&self) -> Vec<Option<CapPlanDateTime>> {
        match self {
            ColumnValues::DateTime(values) => values.clone(),
            ColumnValues::String(values) => values
                .iter()
                .map(|value| {
                    value
                        .as_deref()
                        .and_then(CapPlanDateTime::parse_timestamp)
                })
                .collect(),
            ColumnValues::Integer(values) => values
                .iter()
                .map(|value| {
                    value.and_then(|value| CapPlanDateTime::checked_from_unix_seconds(value as f64))
                })
                .collect(),
            ColumnValues::Float(values) => values
                .iter()
                .map(|value| value.and_then(CapPlanDateTime::checked_from_unix_seconds))
                .collect(),
            ColumnValues::Boolean(values) => vec![None; values.len()],
        }
    }

    /// Selects rows by index, in the given order.
    pub fn take(&self, indices: &[usize]) -> ColumnValues {
        fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&index| values[index].clone()).collect()
        }
        match self {
            ColumnValues::Integer(values) => ColumnValues::Integer(pick(values, indices)),
            ColumnValues::Float(values) => ColumnValues::Float(pick(values, indices)),
            ColumnValues::String(values) => ColumnValues::String(pick(values, indices)),
            ColumnValues::Boolean(values) => ColumnValues::Boolean(pick(values, indices)),
            ColumnValues::DateTime(values) => ColumnValues::DateTime(pick(values, indices)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Column oriented table with a schema discovered at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGrid {
    n_rows: usize,
    columns: Vec<Column>,
}

impl FeatureGrid {
    pub fn new(n_rows: usize, columns: Vec<Column>) -> Result<Self> {
        let mut grid = Self {
            n_rows,
            columns: Vec::with_capacity(columns.len()),
        };
        for column in columns {
            grid.set_column(column)?;
        }
        Ok(grid)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|column| column.name.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    pub fn values(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.values)
    }

    pub fn require(&self, name: &str) -> Result<&ColumnValues> {
        self.values(name)
            .ok_or_else(|| ForecastError::missing_column(name))
    }

    /// Adds a column, or replaces the column with the same name in place.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if column.values.len() != self.n_rows {
            return Err(ForecastError::LengthMismatch {
                column: column.name,
                expected: self.n_rows,
                found: column.values.len(),
            });
        }
        match self
            .columns
            .iter_mut()
            .find(|existing| existing.name == column.name)
        {
            Some(existing) => existing.values = column.values,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let position = self.columns.iter().position(|column| column.name == name)?;
        Some(self.columns.remove(position))
    }

    /// Drops the named columns, ignoring the ones that are absent.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        names
            .iter()
            .filter_map(|name| self.drop_column(name.as_ref()))
            .count()
    }

    /// New grid made of the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> FeatureGrid {
        FeatureGrid {
            n_rows: indices.len(),
            columns: self
                .columns
                .iter()
                .map(|column| Column::new(column.name.clone(), column.values.take(indices)))
                .collect(),
        }
    }
}
