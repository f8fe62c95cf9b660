use crate::datamodel::{Column, ColumnValues, FeatureGrid, MetricSample};
use crate::error::{ForecastError, Result};
use crate::features::{
    CREATED_AT_COLUMN, FeatureRoleClassifier, FeatureSplitter, LabelExpander, RateComputer,
    TimeFeatureExpander, VALUE_COLUMN,
};
use crate::pipeline::{
    CapacityPipeline, ColumnTransformer, EvaluationReport, FittedEstimator, FittedTransformer,
    ForecastPipeline, GbdtParams, GradientBoostedRegressor,
};
use crate::source::MetricsSource;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub mod partition;

pub use partition::{Partition, TrainTestSplit};

/// Everything a training run depends on, passed explicitly to the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Name of the derived rate column, also the regression target
    pub target_column: String,
    pub timestamp_column: String,
    /// Samples whose counter value is not above this are not fetched
    pub value_threshold: f64,
    pub test_fraction: f64,
    pub random_seed: u64,
    pub model: GbdtParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: "value_rate".to_string(),
            timestamp_column: "timestamp".to_string(),
            value_threshold: 100.0,
            test_fraction: 0.2,
            random_seed: 42,
            model: GbdtParams::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_column.is_empty() || self.timestamp_column.is_empty() {
            return Err(ForecastError::invalid_config(
                "target and timestamp column names must not be empty",
            ));
        }
        if self.target_column == self.timestamp_column {
            return Err(ForecastError::invalid_config(
                "target and timestamp columns must differ",
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ForecastError::invalid_config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        self.model.validate()
    }

    /// Columns removed before feature roles are assigned.
    pub fn pruned_columns(&self) -> [&str; 3] {
        [CREATED_AT_COLUMN, self.timestamp_column.as_str(), VALUE_COLUMN]
    }
}

/// Progress of a training run. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrainingStage {
    Raw,
    RateComputed,
    TimeExpanded,
    ColumnsPruned,
    RolesClassified,
    Split,
    TrainTestPartitioned,
    PreprocessorFit,
    ModelFit,
    Evaluated,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingStage::Raw => "raw",
            TrainingStage::RateComputed => "rate computed",
            TrainingStage::TimeExpanded => "time expanded",
            TrainingStage::ColumnsPruned => "columns pruned",
            TrainingStage::RolesClassified => "roles classified",
            TrainingStage::Split => "split",
            TrainingStage::TrainTestPartitioned => "train/test partitioned",
            TrainingStage::PreprocessorFit => "preprocessor fit",
            TrainingStage::ModelFit => "model fit",
            TrainingStage::Evaluated => "evaluated",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct StageTracker {
    stage: TrainingStage,
}

impl StageTracker {
    fn new() -> Self {
        debug!("Training stage: {}", TrainingStage::Raw);
        Self {
            stage: TrainingStage::Raw,
        }
    }

    fn advance(&mut self, next: TrainingStage) {
        debug_assert!(next > self.stage);
        debug!("Training stage: {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Result of a successful training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub pipeline: CapacityPipeline,
    pub report: EvaluationReport,
}

#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Label expansion, rates, calendar features and column pruning.
    ///
    /// Shared by training and prediction so both see the same columns.
    pub fn derive_features(&self, samples: &[MetricSample]) -> Result<FeatureGrid> {
        self.derive_features_tracked(samples, &mut StageTracker::new())
    }

    fn derive_features_tracked(
        &self,
        samples: &[MetricSample],
        tracker: &mut StageTracker,
    ) -> Result<FeatureGrid> {
        let mut grid = self.time_expanded(samples, tracker)?;
        let dropped = grid.drop_columns(&self.config.pruned_columns());
        debug!("Pruned {} non-feature columns", dropped);
        tracker.advance(TrainingStage::ColumnsPruned);

        Ok(grid)
    }

    fn time_expanded(
        &self,
        samples: &[MetricSample],
        tracker: &mut StageTracker,
    ) -> Result<FeatureGrid> {
        let config = &self.config;
        let grid = LabelExpander::new(&config.timestamp_column).expand(samples)?;

        let grid =
            RateComputer::new(&config.timestamp_column, &config.target_column).compute(grid)?;
        tracker.advance(TrainingStage::RateComputed);

        let grid = TimeFeatureExpander::new(&config.timestamp_column).expand(grid)?;
        tracker.advance(TrainingStage::TimeExpanded);
        Ok(grid)
    }

    /// Runs the whole training procedure and scores the held-out rows.
    pub fn train_and_evaluate(&self, samples: &[MetricSample]) -> Result<TrainingOutcome> {
        let config = &self.config;
        let mut tracker = StageTracker::new();

        let grid = self.derive_features_tracked(samples, &mut tracker)?;

        let roles = FeatureRoleClassifier.classify(&grid, &config.target_column)?;
        tracker.advance(TrainingStage::RolesClassified);

        let (x, y) = FeatureSplitter.split(grid, &config.target_column)?;
        tracker.advance(TrainingStage::Split);

        let partition =
            TrainTestSplit::new(config.test_fraction, config.random_seed).partition(x.n_rows())?;
        let x_train = x.take_rows(&partition.train);
        let x_test = x.take_rows(&partition.test);
        let y_train = partition.train.iter().map(|&row| y[row]).collect::<Vec<_>>();
        let y_test = partition.test.iter().map(|&row| y[row]).collect::<Vec<_>>();
        tracker.advance(TrainingStage::TrainTestPartitioned);

        let pipeline = ForecastPipeline::new(
            ColumnTransformer::new(roles),
            GradientBoostedRegressor::new(config.model.clone()),
        );
        let (preprocessor, train_matrix) = pipeline.fit_preprocessor(&x_train)?;
        tracker.advance(TrainingStage::PreprocessorFit);
        let pipeline = pipeline.fit_model(preprocessor, train_matrix.view(), &y_train)?;
        tracker.advance(TrainingStage::ModelFit);

        let test_matrix = pipeline.preprocessor().transform(&x_test)?;
        let predictions = pipeline.model().predict(test_matrix.view())?;
        let report = EvaluationReport::new(&y_test, &predictions, y_train.len());
        tracker.advance(TrainingStage::Evaluated);

        info!("Model evaluation: MAE {:.4}, RMSE {:.4}", report.mae, report.rmse);
        Ok(TrainingOutcome { pipeline, report })
    }

    /// Scores new samples with a fitted pipeline.
    ///
    /// Predictions come back in the row order of the derived features,
    /// which is sorted by timestamp and series. Fitted columns that the
    /// batch does not carry, typically labels nobody set, are scored as
    /// missing. The returned grid keeps the timestamp column so each
    /// prediction can be traced back to its sample.
    pub fn predict(
        &self,
        pipeline: &CapacityPipeline,
        samples: &[MetricSample],
    ) -> Result<(FeatureGrid, Vec<f64>)> {
        let mut grid = self.time_expanded(samples, &mut StageTracker::new())?;
        let pruned = self
            .config
            .pruned_columns()
            .into_iter()
            .filter(|name| *name != self.config.timestamp_column)
            .collect::<Vec<_>>();
        grid.drop_columns(&pruned);
        let n_rows = grid.n_rows();
        let preprocessor = pipeline.preprocessor();

        let absent_numeric = preprocessor
            .numeric_columns()
            .iter()
            .filter(|name| !grid.contains(name))
            .map(|name| Column::new(name.clone(), ColumnValues::Float(vec![None; n_rows])))
            .collect::<Vec<_>>();
        let absent_categorical = preprocessor
            .encoders()
            .iter()
            .filter(|encoder| !grid.contains(encoder.column()))
            .map(|encoder| Column::new(encoder.column(), ColumnValues::String(vec![None; n_rows])))
            .collect::<Vec<_>>();
        for column in absent_numeric.into_iter().chain(absent_categorical) {
            warn!("Column '{}' is absent from the batch, scoring it as missing", column.name);
            grid.set_column(column)?;
        }

        let predictions = pipeline.predict(&grid)?;
        Ok((grid, predictions))
    }
}

/// Fetches at most `limit` samples from the source, then trains and
/// evaluates a pipeline on them.
pub async fn train_from_source(
    source: &dyn MetricsSource,
    config: &TrainingConfig,
    limit: usize,
) -> anyhow::Result<TrainingOutcome> {
    let trainer = Trainer::new(config.clone()).context("Invalid training configuration")?;
    let samples = source
        .fetch_samples(config.value_threshold, limit)
        .await
        .context("Failed to fetch metric samples")?;
    info!("Fetched {} samples from {}", samples.len(), source.name());

    let outcome = tokio::task::spawn_blocking(move || trainer.train_and_evaluate(&samples))
        .await
        .context("Training task panicked")??;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{CapPlanDateTime, CapPlanDateTimeExt};
    use crate::source::InMemoryMetricsSource;

    fn samples(n: usize) -> Vec<MetricSample> {
        let start = 1_700_000_000_i64;
        let mut samples = Vec::new();
        for step in 0..n {
            for (cpu, mode, slope) in [("0", "user", 3.0), ("0", "system", 1.0), ("1", "user", 2.0)]
            {
                let timestamp = CapPlanDateTime::from_unix_seconds_i64(start + step as i64 * 900);
                let value = 1000.0 + slope * step as f64 * (1.0 + (step % 4) as f64);
                samples.push(
                    MetricSample::new(timestamp, value)
                        .with_entity("node-1:9100", cpu, mode)
                        .with_label("job", "node"),
                );
            }
        }
        samples
    }

    fn fast_config() -> TrainingConfig {
        TrainingConfig {
            model: GbdtParams {
                n_estimators: 30,
                learning_rate: 0.2,
                ..GbdtParams::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_stage_order() {
        assert!(TrainingStage::Raw < TrainingStage::Evaluated);
        assert_eq!(TrainingStage::PreprocessorFit.to_string(), "preprocessor fit");
    }

    #[test]
    fn test_derive_features_columns() {
        let trainer = Trainer::new(fast_config()).unwrap();
        let grid = trainer.derive_features(&samples(4)).unwrap();
        let names = grid.column_names();
        for expected in [
            "instance",
            "cpu",
            "mode",
            "job",
            "value_rate",
            "hour",
            "day_of_week",
            "day",
            "month",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        for pruned in ["timestamp", "value", "created_at"] {
            assert!(!names.contains(&pruned));
        }
    }

    #[test]
    fn test_train_and_evaluate() {
        let trainer = Trainer::new(fast_config()).unwrap();
        let outcome = trainer.train_and_evaluate(&samples(40)).unwrap();
        assert_eq!(outcome.report.n_test, 24);
        assert_eq!(outcome.report.n_train, 96);
        assert!(outcome.report.mae >= 0.0);
        assert!(outcome.report.rmse >= outcome.report.mae);
        assert!(
            !outcome
                .pipeline
                .feature_names()
                .contains(&"value_rate".to_string())
        );
    }

    #[test]
    fn test_training_is_deterministic() {
        let trainer = Trainer::new(fast_config()).unwrap();
        let first = trainer.train_and_evaluate(&samples(20)).unwrap();
        let second = trainer.train_and_evaluate(&samples(20)).unwrap();
        assert_eq!(first.report, second.report);
        assert_eq!(first.pipeline, second.pipeline);
    }

    #[test]
    fn test_single_sample_cannot_be_partitioned() {
        let trainer = Trainer::new(fast_config()).unwrap();
        let result = trainer.train_and_evaluate(&samples(1)[..1]);
        assert!(matches!(result, Err(ForecastError::EmptyPartition { .. })));
    }

    #[test]
    fn test_no_samples() {
        let trainer = Trainer::new(fast_config()).unwrap();
        assert!(matches!(
            trainer.train_and_evaluate(&[]),
            Err(ForecastError::NoRows(_))
        ));
    }

    #[test]
    fn test_invalid_config() {
        let config = TrainingConfig {
            test_fraction: 0.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            Trainer::new(config),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_predict_reuses_fitted_columns() {
        let trainer = Trainer::new(fast_config()).unwrap();
        let outcome = trainer.train_and_evaluate(&samples(20)).unwrap();
        let (grid, predictions) = trainer.predict(&outcome.pipeline, &samples(3)).unwrap();
        assert_eq!(grid.n_rows(), predictions.len());
        assert!(predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_predict_keeps_timestamps() {
        let trainer = Trainer::new(fast_config()).unwrap();
        let outcome = trainer.train_and_evaluate(&samples(20)).unwrap();
        let (grid, _) = trainer.predict(&outcome.pipeline, &samples(3)).unwrap();

        let timestamps = grid.require("timestamp").unwrap();
        let rendered = (0..grid.n_rows())
            .map(|row| timestamps.category_at(row).unwrap())
            .collect::<Vec<_>>();
        let mut expected = samples(3)
            .iter()
            .map(|sample| sample.timestamp.resolve().unwrap().to_rfc3339())
            .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(rendered, expected);
        assert!(!grid.contains("value"));
    }

    #[tokio::test]
    async fn test_train_from_source() {
        let source = InMemoryMetricsSource::new(samples(20));
        let outcome = train_from_source(&source, &fast_config(), 45).await.unwrap();
        assert_eq!(outcome.report.n_test + outcome.report.n_train, 45);
    }
}
