//! Prometheus metrics: HTTP request instrumentation plus engine and
//! reconciliation counters, exposed at `GET /metrics`.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    pub const ORDERS_SUBMITTED_TOTAL: &str = "orders_submitted_total";
    pub const ORDERS_MATCHED_TOTAL: &str = "orders_matched_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";

    pub const FIREEYE_CODE: &str = "fireeye_code";
    pub const ORACLE_UPDATES_TOTAL: &str = "oracle_updates_total";
}

pub fn init() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_counter!(names::HTTP_REQUESTS_TOTAL, "HTTP requests by method, path and status");
    describe_histogram!(names::HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency");
    describe_counter!(names::ORDERS_SUBMITTED_TOTAL, "Orders admitted, by type");
    describe_counter!(names::ORDERS_MATCHED_TOTAL, "Fills produced, by kind");
    describe_counter!(names::ORDERS_CANCELLED_TOTAL, "Cancellations, by origin");
    describe_gauge!(names::FIREEYE_CODE, "Current FireEye reconciliation code");
    describe_counter!(names::ORACLE_UPDATES_TOTAL, "ETHUSD oracle refresh attempts");

    handle
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

pub fn order_submitted(order_type: &'static str) {
    counter!(names::ORDERS_SUBMITTED_TOTAL, "type" => order_type).increment(1);
}

pub fn order_matched(fill: &'static str) {
    counter!(names::ORDERS_MATCHED_TOTAL, "fill" => fill).increment(1);
}

pub fn order_cancelled(origin: &'static str) {
    counter!(names::ORDERS_CANCELLED_TOTAL, "origin" => origin).increment(1);
}

pub fn fireeye_code(code: i32) {
    gauge!(names::FIREEYE_CODE).set(code as f64);
}

pub fn oracle_update(ok: bool) {
    counter!(names::ORACLE_UPDATES_TOTAL, "outcome" => if ok { "ok" } else { "error" })
        .increment(1);
}
