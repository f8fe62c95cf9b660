use capplan::datamodel::{CapPlanDateTime, CapPlanDateTimeExt, MetricSample};

/// 2024-05-06T00:00:00Z, a Monday
pub const START_UNIX_SECONDS: i64 = 1_714_953_600;
pub const STEP_SECONDS: i64 = 900;

pub const INSTANCES: [&str; 2] = ["node-a:9100", "node-b:9100"];
pub const CPUS: [&str; 2] = ["0", "1"];
pub const MODES: [&str; 3] = ["user", "system", "idle"];

fn mode_weight(mode: &str) -> f64 {
    match mode {
        "user" => 40.0,
        "system" => 12.0,
        _ => 3.0,
    }
}

/// Busier during the day than during the night.
fn hourly_load(hour: i64) -> f64 {
    if (8..20).contains(&hour) { 2.0 } else { 0.5 }
}

/// Synthetic `node_cpu_seconds_total` counters, one sample per series and
/// step, interleaved across series.
pub fn cpu_counter_samples(steps: usize) -> Vec<MetricSample> {
    let mut counters = vec![200.0; INSTANCES.len() * CPUS.len() * MODES.len()];
    let mut samples = Vec::with_capacity(steps * counters.len());
    for step in 0..steps {
        let unix_seconds = START_UNIX_SECONDS + step as i64 * STEP_SECONDS;
        let hour = (unix_seconds / 3600) % 24;
        let mut series = 0;
        for instance in INSTANCES {
            for cpu in CPUS {
                for mode in MODES {
                    if step > 0 {
                        counters[series] += mode_weight(mode) * hourly_load(hour);
                    }
                    samples.push(
                        MetricSample::new(
                            CapPlanDateTime::from_unix_seconds_i64(unix_seconds),
                            counters[series],
                        )
                        .with_entity(instance, cpu, mode)
                        .with_name("node_cpu_seconds_total")
                        .with_label("__name__", "node_cpu_seconds_total")
                        .with_label("job", "node"),
                    );
                    series += 1;
                }
            }
        }
    }
    samples
}

/// The same kind of samples, as JSON lines with textual timestamps.
pub fn cpu_counter_jsonl(steps: usize) -> String {
    let mut lines = Vec::new();
    for sample in cpu_counter_samples(steps) {
        let line = serde_json::json!({
            "name": "node_cpu_seconds_total",
            "labels": {
                "__name__": "node_cpu_seconds_total",
                "instance": sample.instance,
                "cpu": sample.cpu,
                "mode": sample.mode,
                "job": "node",
            },
            "value": sample.value,
            "timestamp": sample.timestamp.render(),
        });
        lines.push(line.to_string());
    }
    lines.join("\n")
}
