use crate::datamodel::FeatureGrid;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Column names partitioned by how the preprocessing stage treats them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureRoles {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeatureRoles {
    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Assigns feature roles from the runtime type of each column.
///
/// Integer and float columns are numeric, every other column is
/// categorical. Numbers that arrive as text are therefore categorical, no
/// coercion is attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureRoleClassifier;

impl FeatureRoleClassifier {
    pub fn classify(&self, grid: &FeatureGrid, target: &str) -> Result<FeatureRoles> {
        if !grid.contains(target) {
            return Err(ForecastError::MissingTarget {
                target: target.to_string(),
            });
        }

        let mut roles = FeatureRoles::default();
        for column in grid.columns() {
            if column.values.column_type().is_numeric() {
                roles.numeric.push(column.name.clone());
            } else {
                roles.categorical.push(column.name.clone());
            }
        }
        roles.numeric.retain(|name| name != target);

        debug!(
            "Classified {} numeric and {} categorical features",
            roles.numeric.len(),
            roles.categorical.len()
        );
        Ok(roles)
    }
}
