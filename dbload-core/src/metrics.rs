/// Metric names recorded by the harness when the `metrics` feature is enabled.
#[derive(Copy, Clone, Debug)]
pub struct MetricLabels {
    pub success: &'static str,
    pub error: &'static str,
    pub latency: &'static str,
    pub cpu: &'static str,
    pub memory: &'static str,
}

pub const DEFAULT_LABELS: MetricLabels = MetricLabels {
    success: "dbload_query_success",
    error: "dbload_query_error",
    latency: "dbload_query_latency",
    cpu: "dbload_target_cpu_percent",
    memory: "dbload_target_memory_megabytes",
};
