//! Prometheus metric families for the whole service: the HTTP surface,
//! task operations, the chat pipeline (intent detection, confirmations,
//! LLM fallback), and RocksDB.
//!
//! Metric labels never include user IDs or other unbounded values.

use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Request Metrics
    // ============================================================================

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "taskchat_http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        // /api/chat can ride out a full LLM round trip
        .buckets(vec![0.001, 0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint", "status"]
    ).unwrap();

    /// Total HTTP requests
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("taskchat_http_requests_total", "Total HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    // ============================================================================
    // Task Operation Metrics
    // ============================================================================

    /// Task operations by kind and result
    pub static ref TASK_OPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("taskchat_task_ops_total", "Total task operations"),
        &["operation", "result"]  // operation: "create", "list", "get", "update", "complete", "delete"
    ).unwrap();

    /// Task operation duration
    pub static ref TASK_OPS_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "taskchat_task_ops_duration_seconds",
            "Task operation duration"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]),
        &["operation"]
    ).unwrap();

    // ============================================================================
    // Chat Pipeline Metrics
    // ============================================================================

    /// Chat messages handled, by how the reply was produced
    pub static ref CHAT_MESSAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("taskchat_chat_messages_total", "Total chat messages handled"),
        &["outcome"]  // outcome: "operation", "confirmation_pending", "confirmation_resolved", "llm_reply", "canned_reply"
    ).unwrap();

    /// End-to-end chat handling duration (includes LLM fallback when taken)
    pub static ref CHAT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "taskchat_chat_duration_seconds",
            "Chat message handling duration"
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).unwrap();

    /// Intent detections by resolved operation
    pub static ref INTENT_DETECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("taskchat_intent_detections_total", "Total intent detections"),
        &["operation"]  // operation name or "unknown"
    ).unwrap();

    /// Destructive operations currently awaiting confirmation
    pub static ref PENDING_CONFIRMATIONS: IntGauge = IntGauge::new(
        "taskchat_pending_confirmations",
        "Number of destructive operations awaiting user confirmation"
    ).unwrap();

    // ============================================================================
    // LLM Metrics
    // ============================================================================

    /// LLM fallback requests by result
    pub static ref LLM_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("taskchat_llm_requests_total", "Total LLM fallback requests"),
        &["result"]  // result: "success", "connection_error", "timeout_error", "auth_error", "api_error", "llm_unavailable"
    ).unwrap();

    /// LLM request duration
    pub static ref LLM_REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "taskchat_llm_request_duration_seconds",
            "LLM request duration"
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).unwrap();

    // ============================================================================
    // Storage Metrics
    // ============================================================================

    /// RocksDB operations
    pub static ref ROCKSDB_OPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("taskchat_rocksdb_ops_total", "Total RocksDB operations"),
        &["operation", "result"]  // operation: "get", "put", "delete", "scan"
    ).unwrap();

    /// RocksDB operation duration
    pub static ref ROCKSDB_OPS_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "taskchat_rocksdb_ops_duration_seconds",
            "RocksDB operation duration"
        )
        // Point ops are sub-millisecond; scans can hit a compaction stall
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
        &["operation"]
    ).unwrap();
}

/// Register all metrics with the global registry
pub fn register_metrics() -> Result<(), prometheus::Error> {
    // Request metrics
    METRICS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;

    // Task operation metrics
    METRICS_REGISTRY.register(Box::new(TASK_OPS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(TASK_OPS_DURATION.clone()))?;

    // Chat pipeline metrics
    METRICS_REGISTRY.register(Box::new(CHAT_MESSAGES_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CHAT_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(INTENT_DETECTIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(PENDING_CONFIRMATIONS.clone()))?;

    // LLM metrics
    METRICS_REGISTRY.register(Box::new(LLM_REQUESTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(LLM_REQUEST_DURATION.clone()))?;

    // Storage metrics
    METRICS_REGISTRY.register(Box::new(ROCKSDB_OPS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(ROCKSDB_OPS_DURATION.clone()))?;

    Ok(())
}

