pub mod label_expansion;
pub mod rate;
pub mod roles;
pub mod splitter;
pub mod time_features;

pub use label_expansion::LabelExpander;
pub use rate::RateComputer;
pub use roles::{FeatureRoleClassifier, FeatureRoles};
pub use splitter::FeatureSplitter;
pub use time_features::TimeFeatureExpander;

pub const INSTANCE_COLUMN: &str = "instance";
pub const CPU_COLUMN: &str = "cpu";
pub const MODE_COLUMN: &str = "mode";
/// Raw cumulative counter
pub const VALUE_COLUMN: &str = "value";
pub const NAME_COLUMN: &str = "name";
/// Ingestion time recorded by the metrics store
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Prometheus label holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";
