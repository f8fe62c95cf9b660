use smallvec::SmallVec;

pub type MetricLabels = SmallVec<[(String, String); 8]>;

pub trait MetricLabelsExt {
    fn from_json_object(value: &serde_json::Value) -> Self;
    fn label(&self, key: &str) -> Option<&str>;
    fn remove_label(&mut self, key: &str) -> Option<String>;
    fn set_label(&mut self, key: String, value: String);
}

impl MetricLabelsExt for MetricLabels {
    /// Builds labels from a JSON object, as stored in a JSONB column.
    ///
    /// Non string values are kept in their JSON rendering, anything that is
    /// not an object gives no labels at all.
    fn from_json_object(value: &serde_json::Value) -> Self {
        let mut labels = MetricLabels::new();
        if let serde_json::Value::Object(map) = value {
            for (key, value) in map {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                labels.set_label(key.clone(), value);
            }
        }
        labels
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.iter()
            .find(|(label_key, _)| label_key == key)
            .map(|(_, value)| value.as_str())
    }

    fn remove_label(&mut self, key: &str) -> Option<String> {
        let position = self.iter().position(|(label_key, _)| label_key == key)?;
        Some(self.remove(position).1)
    }

    // Last write wins, keys stay unique.
    fn set_label(&mut self, key: String, value: String) {
        match self.iter_mut().find(|(label_key, _)| *label_key == key) {
            Some(existing) => existing.1 = value,
            None => self.push((key, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_object() {
        let labels = MetricLabels::from_json_object(&json!({
            "__name__": "node_cpu_seconds_total",
            "job": "node",
            "weight": 3,
        }));
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.label("job"), Some("node"));
        assert_eq!(labels.label("weight"), Some("3"));
        assert_eq!(labels.label("missing"), None);
    }

    #[test]
    fn test_from_json_not_an_object() {
        assert!(MetricLabels::from_json_object(&json!(null)).is_empty());
        assert!(MetricLabels::from_json_object(&json!(["a", "b"])).is_empty());
    }

    #[test]
    fn test_set_and_remove() {
        let mut labels = MetricLabels::new();
        labels.set_label("cpu".to_string(), "0".to_string());
        labels.set_label("cpu".to_string(), "1".to_string());
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.label("cpu"), Some("1"));

        assert_eq!(labels.remove_label("cpu"), Some("1".to_string()));
        assert_eq!(labels.remove_label("cpu"), None);
        assert!(labels.is_empty());
    }
}
