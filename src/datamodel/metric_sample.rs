use super::{CapPlanDateTime, CapPlanDateTimeExt, MetricLabels, MetricLabelsExt};

/// Timestamp as delivered by the metrics source.
///
/// Sources that only have text keep it verbatim, parsing happens during
/// feature derivation so that a bad value degrades a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleTimestamp {
    Instant(CapPlanDateTime),
    Text(String),
}

impl SampleTimestamp {
    pub fn resolve(&self) -> Option<CapPlanDateTime> {
        match self {
            SampleTimestamp::Instant(instant) => Some(*instant),
            SampleTimestamp::Text(text) => CapPlanDateTime::parse_timestamp(text),
        }
    }

    pub fn render(&self) -> String {
        match self {
            SampleTimestamp::Instant(instant) => instant.to_rfc3339(),
            SampleTimestamp::Text(text) => text.clone(),
        }
    }
}

impl From<CapPlanDateTime> for SampleTimestamp {
    fn from(instant: CapPlanDateTime) -> Self {
        SampleTimestamp::Instant(instant)
    }
}

impl From<&str> for SampleTimestamp {
    fn from(text: &str) -> Self {
        SampleTimestamp::Text(text.to_string())
    }
}

/// One reading of a cumulative counter.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub timestamp: SampleTimestamp,
    pub instance: Option<String>,
    pub cpu: Option<String>,
    pub mode: Option<String>,
    pub value: f64,
    pub labels: MetricLabels,
    /// Metric name, when the store keeps it outside of the labels
    pub name: Option<String>,
    /// When the store ingested the reading
    pub created_at: Option<CapPlanDateTime>,
}

impl MetricSample {
    pub fn new(timestamp: impl Into<SampleTimestamp>, value: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            instance: None,
            cpu: None,
            mode: None,
            value,
            labels: MetricLabels::new(),
            name: None,
            created_at: None,
        }
    }

    /// Builds a sample from a Prometheus style label set, lifting the
    /// `instance`, `cpu` and `mode` labels into their own fields.
    pub fn from_labels(
        timestamp: impl Into<SampleTimestamp>,
        value: f64,
        mut labels: MetricLabels,
    ) -> Self {
        let instance = labels.remove_label("instance");
        let cpu = labels.remove_label("cpu");
        let mode = labels.remove_label("mode");
        Self {
            timestamp: timestamp.into(),
            instance,
            cpu,
            mode,
            value,
            labels,
            name: None,
            created_at: None,
        }
    }

    pub fn with_entity(mut self, instance: &str, cpu: &str, mode: &str) -> Self {
        self.instance = Some(instance.to_string());
        self.cpu = Some(cpu.to_string());
        self.mode = Some(mode.to_string());
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.set_label(key.to_string(), value.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_created_at(mut self, created_at: CapPlanDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }
}
