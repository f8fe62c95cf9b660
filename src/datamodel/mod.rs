pub mod capplan_datetime;
pub mod feature_grid;
pub mod metric_labels;
pub mod metric_sample;

pub use capplan_datetime::{CalendarFields, CapPlanDateTime, CapPlanDateTimeExt};
pub use feature_grid::{Column, ColumnType, ColumnValues, FeatureGrid};
pub use metric_labels::{MetricLabels, MetricLabelsExt};
pub use metric_sample::{MetricSample, SampleTimestamp};
