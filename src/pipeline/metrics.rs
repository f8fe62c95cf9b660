use serde::{Deserialize, Serialize};
use std::fmt;

/// Held-out scores of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub mae: f64,
    pub rmse: f64,
    pub n_train: usize,
    pub n_test: usize,
}

impl EvaluationReport {
    pub fn new(y_true: &[f64], y_pred: &[f64], n_train: usize) -> Self {
        Self {
            mae: mean_absolute_error(y_true, y_pred),
            rmse: root_mean_squared_error(y_true, y_pred),
            n_train,
            n_test: y_true.len(),
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE: {:.6}, RMSE: {:.6} ({} train rows, {} test rows)",
            self.mae, self.rmse, self.n_train, self.n_test
        )
    }
}

/// Pairs whose target or prediction is not finite are left out.
fn finite_errors<'a>(y_true: &'a [f64], y_pred: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
    y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t.is_finite() && p.is_finite())
        .map(|(t, p)| t - p)
}

/// NaN when there is nothing to score.
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let (sum, count) = finite_errors(y_true, y_pred)
        .fold((0.0, 0usize), |(sum, count), error| (sum + error.abs(), count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let (sum, count) = finite_errors(y_true, y_pred)
        .fold((0.0, 0usize), |(sum, count), error| (sum + error * error, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        (sum / count as f64).sqrt()
    }
}
