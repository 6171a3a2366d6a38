use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static POSSESSION_CYCLES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "possession_cycles_total",
        "Possession cycles started by the scheduler"
    )
    .expect("register possession_cycles_total")
});

pub static POSSESSION_SUCCESS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "possession_success_total",
        "Possessions that renamed the bot and were recorded"
    )
    .expect("register possession_success_total")
});

pub static POSSESSION_ABANDONED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "possession_abandoned_total",
        "Possession attempts that found no eligible group or member, or whose rename failed"
    )
    .expect("register possession_abandoned_total")
});

pub static POSSESSION_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "possession_errors_total",
        "Scheduler cycles aborted by remote or storage errors"
    )
    .expect("register possession_errors_total")
});

pub static STATE_FLUSH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "state_flush_failures_total",
        "Failed writes of the possession state file"
    )
    .expect("register state_flush_failures_total")
});

/// Render the default registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("metrics encode error: {e}"))?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
