//! Fit/transform stages and their composition into a forecasting pipeline.
//!
//! Fitting an unfitted stage returns a distinct fitted type, so a pipeline
//! that has not been trained cannot be asked for predictions.

use crate::datamodel::FeatureGrid;
use crate::error::Result;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod column_transformer;
pub mod gbdt;
pub mod metrics;

pub use column_transformer::{ColumnTransformer, FittedColumnTransformer, OneHotEncoder};
pub use gbdt::{GbdtParams, GradientBoostedRegressor, GradientBoostedTrees};
pub use metrics::{EvaluationReport, mean_absolute_error, root_mean_squared_error};

/// Preprocessing stage, fitted on a feature grid.
pub trait Transformer {
    type Fitted: FittedTransformer;

    fn fit(&self, x: &FeatureGrid) -> Result<Self::Fitted>;
}

pub trait FittedTransformer {
    /// Turns a grid into a dense matrix, one row per grid row.
    fn transform(&self, x: &FeatureGrid) -> Result<Array2<f64>>;

    /// Names of the output matrix columns.
    fn feature_names(&self) -> Vec<String>;
}

/// Regression stage, fitted on a dense matrix and its targets.
pub trait Estimator {
    type Fitted: FittedEstimator;

    fn fit(&self, x: ArrayView2<f64>, y: &[f64]) -> Result<Self::Fitted>;
}

pub trait FittedEstimator {
    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<f64>>;
}

/// A preprocessing stage followed by an estimator.
#[derive(Debug, Clone)]
pub struct ForecastPipeline<T, E> {
    preprocessor: T,
    model: E,
}

impl<T: Transformer, E: Estimator> ForecastPipeline<T, E> {
    pub fn new(preprocessor: T, model: E) -> Self {
        Self {
            preprocessor,
            model,
        }
    }

    /// Fits the preprocessor on `x` and returns it with the transformed `x`.
    pub fn fit_preprocessor(&self, x: &FeatureGrid) -> Result<(T::Fitted, Array2<f64>)> {
        let preprocessor = self.preprocessor.fit(x)?;
        let matrix = preprocessor.transform(x)?;
        debug!(
            "Preprocessed training matrix: {} rows, {} features",
            matrix.nrows(),
            matrix.ncols()
        );
        Ok((preprocessor, matrix))
    }

    pub fn fit_model(
        &self,
        preprocessor: T::Fitted,
        matrix: ArrayView2<f64>,
        y: &[f64],
    ) -> Result<FittedForecastPipeline<T::Fitted, E::Fitted>> {
        let model = self.model.fit(matrix, y)?;
        Ok(FittedForecastPipeline {
            preprocessor,
            model,
        })
    }

    /// Fits the preprocessor then the model, both on `x` only.
    pub fn fit(
        &self,
        x: &FeatureGrid,
        y: &[f64],
    ) -> Result<FittedForecastPipeline<T::Fitted, E::Fitted>> {
        let (preprocessor, matrix) = self.fit_preprocessor(x)?;
        self.fit_model(preprocessor, matrix.view(), y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedForecastPipeline<T, E> {
    preprocessor: T,
    model: E,
}

impl<T: FittedTransformer, E: FittedEstimator> FittedForecastPipeline<T, E> {
    pub fn predict(&self, x: &FeatureGrid) -> Result<Vec<f64>> {
        let matrix = self.preprocessor.transform(x)?;
        self.model.predict(matrix.view())
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.preprocessor.feature_names()
    }

    pub fn preprocessor(&self) -> &T {
        &self.preprocessor
    }

    pub fn model(&self) -> &E {
        &self.model
    }
}

/// The pipeline trained by this crate.
pub type CapacityPipeline = FittedForecastPipeline<FittedColumnTransformer, GradientBoostedTrees>;
