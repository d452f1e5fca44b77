/// Prometheus metrics for credential compaction
#[cfg(feature = "metrics")]
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;

#[cfg(feature = "metrics")]
static OUTBOUND_CREDENTIALS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "jwt_compaction_outbound_total",
        "Outbound calls by credential form",
        &["role", "form"]
    )
    .expect("Failed to register outbound credential metric")
});

#[cfg(feature = "metrics")]
static FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "jwt_compaction_fallbacks_total",
        "Codec failures recovered by falling back",
        &["reason"]
    )
    .expect("Failed to register compaction fallback metric")
});

#[cfg(feature = "metrics")]
static WIRE_BYTES: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "jwt_compaction_wire_bytes",
        "Bytes of credential field values per outbound call",
        &["form"],
        vec![64.0, 128.0, 256.0, 512.0, 768.0, 1024.0, 2048.0, 4096.0]
    )
    .expect("Failed to register compaction wire bytes metric")
});

/// Metrics collector for compaction
#[cfg(feature = "metrics")]
pub struct CompactionMetrics;

#[cfg(feature = "metrics")]
impl CompactionMetrics {
    pub fn record_outbound(role: &str, form: &str, wire_len: usize) {
        OUTBOUND_CREDENTIALS.with_label_values(&[role, form]).inc();
        WIRE_BYTES
            .with_label_values(&[form])
            .observe(wire_len as f64);
    }

    pub fn record_fallback(reason: &str) {
        FALLBACKS.with_label_values(&[reason]).inc();
    }
}

// No-op implementation when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub struct CompactionMetrics;

#[cfg(not(feature = "metrics"))]
impl CompactionMetrics {
    pub fn record_outbound(_role: &str, _form: &str, _wire_len: usize) {}
    pub fn record_fallback(_reason: &str) {}
}
