use anyhow::Result;
use std::future::Future;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Aggregate outcome of one orchestration mode run.
#[derive(Debug, Default, Clone)]
pub struct ModeStats {
    pub success: u64,
    pub failed: u64,
}

pub struct ModeRunner;

impl ModeRunner {
    /// Drives one orchestration mode to completion with cooperative Ctrl-C
    /// handling: the token is cancelled on interrupt, the mode finishes its
    /// in-flight step (persisted flags define the resume point) and returns.
    pub async fn run<F, Fut>(mode_name: &str, mode: F) -> Result<ModeStats>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<ModeStats>>,
    {
        let token = CancellationToken::new();
        let cloned_token = token.clone();

        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C. Finishing the current step, then stopping...");
                    cloned_token.cancel();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        let start_time = std::time::Instant::now();
        info!("[{}] Starting", mode_name);

        let stats = mode(token).await?;

        let total = stats.success + stats.failed;
        let rate = if total > 0 {
            (stats.success as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        info!(
            "[{}] Done in {:.1}s | Success: {} | Fail: {} | Success Rate: {:.2}%",
            mode_name,
            start_time.elapsed().as_secs_f64(),
            stats.success,
            stats.failed,
            rate
        );

        Ok(stats)
    }
}
