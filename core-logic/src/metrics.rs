use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub steps: StepMetrics,
    pub rpc: RpcMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepMetrics {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcMetrics {
    pub total_calls: u64,
    pub avg_latency_ms: f64,
}

/// Process-wide counters for orchestration steps and RPC round-trips.
#[derive(Debug)]
pub struct MetricsCollector {
    steps_total: AtomicU64,
    steps_success: AtomicU64,
    steps_failed: AtomicU64,
    step_duration_sum_ms: AtomicU64,
    rpc_calls: AtomicU64,
    rpc_latency_sum_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            steps_total: AtomicU64::new(0),
            steps_success: AtomicU64::new(0),
            steps_failed: AtomicU64::new(0),
            step_duration_sum_ms: AtomicU64::new(0),
            rpc_calls: AtomicU64::new(0),
            rpc_latency_sum_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn global() -> &'static Self {
        static INSTANCE: std::sync::OnceLock<MetricsCollector> = std::sync::OnceLock::new();
        INSTANCE.get_or_init(MetricsCollector::default)
    }

    pub fn record_step(&self, _name: &str, duration: Duration, success: bool) {
        self.steps_total.fetch_add(1, Ordering::SeqCst);
        self.step_duration_sum_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);

        if success {
            self.steps_success.fetch_add(1, Ordering::SeqCst);
        } else {
            self.steps_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_rpc_latency(&self, latency: Duration) {
        self.rpc_calls.fetch_add(1, Ordering::SeqCst);
        self.rpc_latency_sum_ms
            .fetch_add(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.steps_total.load(Ordering::SeqCst);
        let success = self.steps_success.load(Ordering::SeqCst);
        let duration_sum = self.step_duration_sum_ms.load(Ordering::SeqCst);
        let rpc_calls = self.rpc_calls.load(Ordering::SeqCst);
        let rpc_latency = self.rpc_latency_sum_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            steps: StepMetrics {
                total,
                success,
                failed: self.steps_failed.load(Ordering::SeqCst),
                success_rate: if total > 0 {
                    success as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                avg_duration_ms: if total > 0 {
                    duration_sum as f64 / total as f64
                } else {
                    0.0
                },
            },
            rpc: RpcMetrics {
                total_calls: rpc_calls,
                avg_latency_ms: if rpc_calls > 0 {
                    rpc_latency as f64 / rpc_calls as f64
                } else {
                    0.0
                },
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        tokio::fs::write(path, self.to_json()).await
    }

    pub fn steps_total(&self) -> u64 {
        self.steps_total.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let metrics = MetricsCollector::default();

        metrics.record_step("withdraw", Duration::from_millis(100), true);
        metrics.record_step("swap", Duration::from_millis(200), true);
        metrics.record_step("bridge", Duration::from_millis(150), false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.steps.total, 3);
        assert_eq!(snapshot.steps.success, 2);
        assert_eq!(snapshot.steps.failed, 1);
        assert!((snapshot.steps.success_rate - 66.67).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_json_export() {
        let metrics = MetricsCollector::default();
        metrics.record_step("swap", Duration::from_millis(100), true);

        let json = metrics.to_json();
        assert!(json.contains("steps"));
        assert!(json.contains("rpc"));
    }
}
