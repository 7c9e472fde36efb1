use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Log output and optional OTLP span export for `serve`.
///
/// Every run is a `run` span carrying its `run_id`; with an
/// `otlp_endpoint` set those spans are exported to a collector as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Emit logs as JSON lines (`true`) or compact text (`false`).
    #[serde(default = "d_true")]
    pub json_logs: bool,

    /// OTLP gRPC endpoint, e.g. `http://localhost:4317`.  Unset disables export.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// Ratio of traces kept, `0.0..=1.0`.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: d_true(),
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

impl ObservabilityConfig {
    pub fn otlp_enabled(&self) -> bool {
        self.otlp_endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

fn d_true() -> bool {
    true
}
fn d_service_name() -> String {
    "assistant-stream".into()
}
fn d_sample_rate() -> f64 {
    1.0
}
