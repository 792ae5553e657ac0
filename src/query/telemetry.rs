use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Log target for structured query lines; `logger::init_for_app_in` routes it
/// to its own rolling file.
pub const QUERY_LOG_TARGET: &str = "appgrid::queries";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let slow = std::env::var("APPGRID_SLOW_QUERY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(500);
        Self { slow_query_ms: slow }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub entities_created_total: AtomicU64,
    pub cursors_issued_total: AtomicU64,
    pub invalid_cursors_total: AtomicU64,
    pub type_mismatches_total: AtomicU64,
    pub store_failures_total: AtomicU64,
    pub timeouts_total: AtomicU64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
    // For tests we can capture query lines in-memory
    query_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> =
    std::sync::LazyLock::new(Telemetry::default);

pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.cfg.write().slow_query_ms = ms;
}

pub fn set_query_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.query_sink.write() = Some(sink);
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

/// One finished page request, as seen by the executor.
#[derive(Debug, Clone, Copy)]
pub struct QueryRecord<'a> {
    pub entity_type: &'a str,
    pub predicate: &'a str,
    pub plan: &'a str,
    pub limit: usize,
    pub returned: usize,
    pub scanned: usize,
    pub resumed: bool,
    pub has_more: bool,
    pub duration_ms: u128,
}

pub fn record_query(rec: &QueryRecord<'_>) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let slow_query_ms = TELEMETRY.cfg.read().slow_query_ms;
    let predicate_hash = sha256_hex(rec.predicate);
    let duration_ms = u64::try_from(rec.duration_ms).unwrap_or(u64::MAX);
    let slow = duration_ms >= slow_query_ms;
    if slow {
        TELEMETRY.metrics.queries_slow_total.fetch_add(1, Ordering::Relaxed);
    }
    let line = serde_json::json!({
        "ts": now_ts(),
        "type": rec.entity_type,
        "predicate_hash": predicate_hash,
        "plan": rec.plan,
        "limit": rec.limit,
        "returned": rec.returned,
        "scanned": rec.scanned,
        "resumed": rec.resumed,
        "has_more": rec.has_more,
        "duration_ms": duration_ms,
        "slow": slow
    })
    .to_string();
    if slow {
        log::warn!(target: QUERY_LOG_TARGET, "{line}");
    } else {
        log::info!(target: QUERY_LOG_TARGET, "{line}");
    }
    let sink = TELEMETRY.query_sink.read().clone();
    if let Some(sink) = sink {
        sink.write().push(line);
    }
}

pub fn record_entity_created() {
    TELEMETRY.metrics.entities_created_total.fetch_add(1, Ordering::Relaxed);
}

pub fn record_cursor_issued() {
    TELEMETRY.metrics.cursors_issued_total.fetch_add(1, Ordering::Relaxed);
}

pub fn record_invalid_cursor() {
    TELEMETRY.metrics.invalid_cursors_total.fetch_add(1, Ordering::Relaxed);
}

pub fn record_type_mismatches(n: u64) {
    if n > 0 {
        TELEMETRY.metrics.type_mismatches_total.fetch_add(n, Ordering::Relaxed);
    }
}

pub fn record_store_failure() {
    TELEMETRY.metrics.store_failures_total.fetch_add(1, Ordering::Relaxed);
}

pub fn record_timeout() {
    TELEMETRY.metrics.timeouts_total.fetch_add(1, Ordering::Relaxed);
}

#[must_use]
pub fn metrics_text() -> String {
    // OpenMetrics/Prometheus exposition format (no types/HELP for brevity)
    let m = &TELEMETRY.metrics;
    format!(
        "appgrid_queries_total {}\n\
         appgrid_queries_slow_total {}\n\
         appgrid_entities_created_total {}\n\
         appgrid_cursors_issued_total {}\n\
         appgrid_invalid_cursors_total {}\n\
         appgrid_type_mismatches_total {}\n\
         appgrid_store_failures_total {}\n\
         appgrid_query_timeouts_total {}\n",
        m.queries_total.load(Ordering::Relaxed),
        m.queries_slow_total.load(Ordering::Relaxed),
        m.entities_created_total.load(Ordering::Relaxed),
        m.cursors_issued_total.load(Ordering::Relaxed),
        m.invalid_cursors_total.load(Ordering::Relaxed),
        m.type_mismatches_total.load(Ordering::Relaxed),
        m.store_failures_total.load(Ordering::Relaxed),
        m.timeouts_total.load(Ordering::Relaxed),
    )
}
