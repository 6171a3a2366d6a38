use std::sync::Arc;
use std::time::Duration;

use configs::IntervalConfig;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::possession::service::{CycleOutcome, PossessionService};

/// No sleep is ever shorter than this, whatever the configuration says.
pub const MIN_SLEEP: Duration = Duration::from_secs(30);
/// Pause after a cycle fails on a remote or storage error.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// Uniform draw in the configured minute range, floored at [`MIN_SLEEP`].
pub fn sleep_duration<R: Rng + ?Sized>(interval: &IntervalConfig, rng: &mut R) -> Duration {
    let (min, max) = interval.effective_range();
    let minutes = rng.gen_range(min..=max);
    Duration::from_secs(minutes.saturating_mul(60)).max(MIN_SLEEP)
}

/// Handle to the background possession loop.
///
/// The loop stops at its next sleep once cancelled; a cycle already talking
/// to the platform runs to completion first.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn start(service: Arc<PossessionService>, interval: IntervalConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (min, max) = interval.effective_range();
        info!(min_minutes = min, max_minutes = max, "possession scheduler started");
        let handle = tokio::spawn(run_loop(service, interval, shutdown_rx));
        Self { shutdown_tx, handle }
    }

    pub fn cancel(&self) {
        // the receiver is gone once the loop has exited
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "possession scheduler task ended abnormally");
        }
    }
}

/// Sleep for `delay`; false if shutdown was requested first.
async fn sleep_or_cancel(shutdown_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *shutdown_rx.borrow() {
        return false;
    }
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return false;
                }
            }
            _ = &mut sleep => return true,
        }
    }
}

async fn run_loop(service: Arc<PossessionService>, interval: IntervalConfig, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        let delay = sleep_duration(&interval, &mut rand::thread_rng());
        debug!(delay_secs = delay.as_secs(), "sleeping until next possession");
        if !sleep_or_cancel(&mut shutdown_rx, delay).await {
            break;
        }

        metrics::POSSESSION_CYCLES_TOTAL.inc();
        match service.run_cycle().await {
            Ok(CycleOutcome::Possessed(_)) => {}
            Ok(outcome) => debug!(?outcome, "possession cycle abandoned"),
            Err(e) => {
                metrics::POSSESSION_ERRORS_TOTAL.inc();
                warn!(error = %e, backoff_secs = ERROR_BACKOFF.as_secs(), "possession cycle failed");
                if !sleep_or_cancel(&mut shutdown_rx, ERROR_BACKOFF).await {
                    break;
                }
            }
        }
    }
    info!("possession scheduler stopped");
}
