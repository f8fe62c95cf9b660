use super::{FittedTransformer, Transformer};
use crate::datamodel::{ColumnValues, FeatureGrid};
use crate::error::{ForecastError, Result};
use crate::features::FeatureRoles;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

const MISSING_CATEGORY: &str = "<missing>";

/// Numeric passthrough plus one-hot encoding of categorical columns.
///
/// Columns outside of the two roles are dropped.
#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    roles: FeatureRoles,
}

impl ColumnTransformer {
    pub fn new(roles: FeatureRoles) -> Self {
        Self { roles }
    }
}

impl Transformer for ColumnTransformer {
    type Fitted = FittedColumnTransformer;

    fn fit(&self, x: &FeatureGrid) -> Result<FittedColumnTransformer> {
        for name in &self.roles.numeric {
            check_numeric(name, x.require(name)?)?;
        }
        let encoders = self
            .roles
            .categorical
            .iter()
            .map(|name| -> Result<OneHotEncoder> { Ok(OneHotEncoder::fit(name, x.require(name)?)) })
            .collect::<Result<Vec<_>>>()?;

        let fitted = FittedColumnTransformer {
            numeric: self.roles.numeric.clone(),
            encoders,
        };
        debug!(
            "Fitted column transformer on {} rows, {} output features",
            x.n_rows(),
            fitted.n_features()
        );
        Ok(fitted)
    }
}

fn check_numeric(name: &str, values: &ColumnValues) -> Result<()> {
    if values.column_type().is_numeric() {
        Ok(())
    } else {
        Err(ForecastError::ColumnType {
            column: name.to_string(),
            expected: "numeric",
            found: values.column_type(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedColumnTransformer {
    numeric: Vec<String>,
    encoders: Vec<OneHotEncoder>,
}

impl FittedColumnTransformer {
    pub fn n_features(&self) -> usize {
        self.numeric.len()
            + self
                .encoders
                .iter()
                .map(|encoder| encoder.width())
                .sum::<usize>()
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric
    }

    pub fn encoders(&self) -> &[OneHotEncoder] {
        &self.encoders
    }
}

impl FittedTransformer for FittedColumnTransformer {
    fn transform(&self, x: &FeatureGrid) -> Result<Array2<f64>> {
        let mut matrix = Array2::<f64>::zeros((x.n_rows(), self.n_features()));

        for (offset, name) in self.numeric.iter().enumerate() {
            let values = x.require(name)?;
            check_numeric(name, values)?;
            for row in 0..x.n_rows() {
                matrix[[row, offset]] = values.as_f64(row).unwrap_or(f64::NAN);
            }
        }

        let mut offset = self.numeric.len();
        for encoder in &self.encoders {
            let values = x.require(&encoder.column)?;
            for row in 0..x.n_rows() {
                if let Some(index) = encoder.index_of(values.category_at(row).as_deref()) {
                    matrix[[row, offset + index]] = 1.0;
                }
            }
            offset += encoder.width();
        }

        Ok(matrix)
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric.clone();
        for encoder in &self.encoders {
            names.extend(encoder.feature_names());
        }
        names
    }
}

/// Known categories of one column, learned from the training rows.
///
/// Categories are sorted, a missing value is a category of its own placed
/// last. Unknown values encode to all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    column: String,
    categories: Vec<String>,
    has_missing: bool,
}

impl OneHotEncoder {
    pub fn fit(column: &str, values: &ColumnValues) -> Self {
        let mut categories = BTreeSet::new();
        let mut has_missing = false;
        for row in 0..values.len() {
            match values.category_at(row) {
                Some(category) => {
                    categories.insert(category);
                }
                None => has_missing = true,
            }
        }
        Self {
            column: column.to_string(),
            categories: categories.into_iter().collect(),
            has_missing,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn width(&self) -> usize {
        self.categories.len() + usize::from(self.has_missing)
    }

    pub fn index_of(&self, category: Option<&str>) -> Option<usize> {
        match category {
            Some(category) => self
                .categories
                .binary_search_by(|known| known.as_str().cmp(category))
                .ok(),
            None if self.has_missing => Some(self.categories.len()),
            None => None,
        }
    }

    fn feature_names(&self) -> impl Iterator<Item = String> + '_ {
        self.categories
            .iter()
            .map(|category| format!("{}={}", self.column, category))
            .chain(
                self.has_missing
                    .then(|| format!("{}={}", self.column, MISSING_CATEGORY)),
            )
    }
}
