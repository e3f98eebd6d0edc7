use serde::Serialize;

/// Per-run metrics, accumulated step by step and serializable for offline
/// inspection.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiagnosticLog {
    pub total_steps: usize,
    pub step_metrics: StepMetricsCollection,
}

impl DiagnosticLog {
    pub fn push(&mut self, step_metrics: StepMetrics) {
        self.step_metrics.push(step_metrics);
        self.total_steps += 1;
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StepMetricsCollection {
    pub active_walker_count: Vec<i32>,
    pub time_step: Vec<f64>,
    pub surface_version: Vec<u64>,
}

impl StepMetricsCollection {
    pub fn push(&mut self, metrics: StepMetrics) {
        self.active_walker_count.push(metrics.active_walker_count);
        self.time_step.push(metrics.time_step);
        self.surface_version.push(metrics.surface_version);
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StepMetrics {
    pub active_walker_count: i32,
    pub time_step: f64,
    pub surface_version: u64,
}
