// ============================================================================
// PROMETHEUS METRICS
// ============================================================================

use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec, IntCounter, IntCounterVec};

lazy_static! {
    // ========================================================================
    // HTTP REQUEST METRICS
    // ========================================================================

    /// Total HTTP requests by method, endpoint and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "endpoint", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "endpoint"],
        vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========================================================================
    // RESPONSE CACHE METRICS
    // ========================================================================

    /// Lookups by route and result (hit, miss, bypass)
    pub static ref RESPONSE_CACHE_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "response_cache_lookups_total",
        "Response cache lookups by outcome",
        &["route", "result"]
    )
    .unwrap();

    /// Backend and context failures swallowed by the cache layer
    pub static ref RESPONSE_CACHE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "response_cache_errors_total",
        "Response cache failures by stage",
        &["stage"]
    )
    .unwrap();

    pub static ref RESPONSE_CACHE_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "response_cache_writes_total",
        "Response cache write-backs by outcome",
        &["result"]
    )
    .unwrap();

    pub static ref RESPONSE_CACHE_INVALIDATED_KEYS_TOTAL: IntCounter = register_int_counter!(
        "response_cache_invalidated_keys_total",
        "Keys removed by bulk invalidation"
    )
    .unwrap();
}

/// Helper para registrar una request HTTP
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration_secs);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    Hit,
    Miss,
    Bypass,
}

impl LookupResult {
    fn as_label(self) -> &'static str {
        match self {
            LookupResult::Hit => "hit",
            LookupResult::Miss => "miss",
            LookupResult::Bypass => "bypass",
        }
    }
}

pub fn record_cache_lookup(route: &str, result: LookupResult) {
    RESPONSE_CACHE_LOOKUPS_TOTAL
        .with_label_values(&[route, result.as_label()])
        .inc();
}

pub fn record_cache_error(stage: &str) {
    RESPONSE_CACHE_ERRORS_TOTAL.with_label_values(&[stage]).inc();
}

pub fn record_cache_write(result: &str) {
    RESPONSE_CACHE_WRITES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_invalidated_keys(count: u64) {
    RESPONSE_CACHE_INVALIDATED_KEYS_TOTAL.inc_by(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_counters_increment_per_label() {
        let before = RESPONSE_CACHE_LOOKUPS_TOTAL
            .with_label_values(&["/metrics-test", "hit"])
            .get();
        record_cache_lookup("/metrics-test", LookupResult::Hit);
        record_cache_lookup("/metrics-test", LookupResult::Miss);
        let after = RESPONSE_CACHE_LOOKUPS_TOTAL
            .with_label_values(&["/metrics-test", "hit"])
            .get();
        assert_eq!(after, before + 1);
    }
}
