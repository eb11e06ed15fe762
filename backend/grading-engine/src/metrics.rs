use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter,
    register_int_counter_vec, CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // Grading Metrics
    pub static ref GRADES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "grades_total",
        "Total number of graded answers",
        &["question_type"]
    )
    .unwrap();

    pub static ref GRADER_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "grader_failures_total",
        "Graders that panicked or produced a non-finite score",
        &["question_type"]
    )
    .unwrap();

    // Feedback Metrics
    pub static ref FEEDBACK_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feedback_generated_total",
        "Feedback texts produced, by source",
        &["source"]
    )
    .unwrap();

    // Cache Metrics
    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Feedback cache operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Provider Metrics
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "provider_requests_total",
        "Text-generation provider calls",
        &["provider", "status"]
    )
    .unwrap();

    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "provider_request_duration_seconds",
        "Text-generation provider call duration in seconds",
        &["provider"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Joint Evaluation Metrics
    pub static ref JOINT_EVALUATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "joint_evaluations_total",
        "AI joint evaluations, by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref JOINT_SCORE_DIVERGENCE_TOTAL: IntCounter = register_int_counter!(
        "joint_score_divergence_total",
        "AI joint scores more than one tier away from the deterministic score"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: time a cache operation
pub async fn track_cache_operation<F, T>(operation: &str, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
    result
}

/// Record cache hit
pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

/// Record cache miss
pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}
