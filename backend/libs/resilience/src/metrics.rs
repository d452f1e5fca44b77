/// Prometheus metrics for fault injection and retries
#[cfg(feature = "metrics")]
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;

#[cfg(feature = "metrics")]
static INJECTED_FAULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "resilience_injected_faults_total",
        "Total number of calls short-circuited by fault injection",
        &["kind"]
    )
    .expect("Failed to register injected faults metric")
});

#[cfg(feature = "metrics")]
static RETRY_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "resilience_retry_attempts",
        "Number of attempts before success or failure",
        &["result"],
        vec![1.0, 2.0, 3.0, 4.0, 5.0]
    )
    .expect("Failed to register retry attempts metric")
});

/// Metrics collector for fault injection
#[cfg(feature = "metrics")]
pub struct FaultInjectionMetrics;

#[cfg(feature = "metrics")]
impl FaultInjectionMetrics {
    pub fn record_injected(kind: &str) {
        INJECTED_FAULTS.with_label_values(&[kind]).inc();
    }
}

/// Metrics collector for retries
#[cfg(feature = "metrics")]
pub struct RetryMetrics;

#[cfg(feature = "metrics")]
impl RetryMetrics {
    pub fn record_attempts(result: &str, attempts: u32) {
        RETRY_ATTEMPTS
            .with_label_values(&[result])
            .observe(attempts as f64);
    }
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub struct FaultInjectionMetrics;

#[cfg(not(feature = "metrics"))]
impl FaultInjectionMetrics {
    pub fn record_injected(_kind: &str) {}
}

#[cfg(not(feature = "metrics"))]
pub struct RetryMetrics;

#[cfg(not(feature = "metrics"))]
impl RetryMetrics {
    pub fn record_attempts(_result: &str, _attempts: u32) {}
}
