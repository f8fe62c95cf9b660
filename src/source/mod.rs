pub mod jsonl;
pub mod memory;
pub mod metrics_source;
#[cfg(feature = "postgres")]
pub mod postgresql;
pub mod source_factory;

pub use jsonl::JsonlMetricsSource;
pub use memory::InMemoryMetricsSource;
pub use metrics_source::MetricsSource;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresMetricsSource;
pub use source_factory::create_metrics_source;
