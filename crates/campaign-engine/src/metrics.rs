/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Metrics Module
//!
//! This module provides Prometheus metrics for the campaign engine.
//! It exposes metrics about HTTP requests, database queries, scheduler
//! ticks, and the resilience fabric's circuit breakers.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global Prometheus registry for all engine metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// HTTP request counter.
/// Labels: endpoint, method, status
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "campaign_http_requests_total",
        "Total number of HTTP requests by endpoint and status",
    );
    let counter = CounterVec::new(opts, &["endpoint", "method", "status"])
        .expect("Failed to create HTTP requests counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register HTTP requests counter");
    counter
});

/// HTTP request duration histogram.
/// Labels: endpoint, method
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "campaign_http_request_duration_seconds",
        "HTTP request latency distribution in seconds",
    )
    .buckets(vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]);
    let histogram = HistogramVec::new(opts, &["endpoint", "method"])
        .expect("Failed to create HTTP request duration histogram");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Failed to register HTTP request duration histogram");
    histogram
});

/// Database query counter.
/// Labels: query_type
pub static DATABASE_QUERIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "campaign_database_queries_total",
        "Total number of database queries by type",
    );
    let counter =
        CounterVec::new(opts, &["query_type"]).expect("Failed to create database queries counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register database queries counter");
    counter
});

/// Database query duration histogram.
/// Labels: query_type
pub static DATABASE_QUERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "campaign_database_query_duration_seconds",
        "Database query latency distribution in seconds",
    )
    .buckets(vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
    ]);
    let histogram = HistogramVec::new(opts, &["query_type"])
        .expect("Failed to create database query duration histogram");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Failed to register database query duration histogram");
    histogram
});

/// Scheduler per-enrollment outcome counter.
/// Labels: outcome (sent, completed, deferred, failed)
pub static SCHEDULER_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "campaign_scheduler_outcomes_total",
        "Total number of per-enrollment scheduler outcomes by kind",
    );
    let counter = IntCounterVec::new(opts, &["outcome"]).expect("Failed to create scheduler outcomes counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register scheduler outcomes counter");
    counter
});

/// Number of enrollments claimed across all scheduler ticks.
pub static SCHEDULER_CLAIMED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "campaign_scheduler_claimed_total",
        "Total number of enrollments claimed across all scheduler ticks",
    );
    let counter = IntCounterVec::new(opts, &["scheduler"]).expect("Failed to create scheduler claimed counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register scheduler claimed counter");
    counter
});

/// Circuit breaker state gauge, 1 if open, 0 otherwise.
/// Labels: channel
pub static CIRCUIT_BREAKER_OPEN: Lazy<GaugeVec> = Lazy::new(|| {
    let opts = Opts::new(
        "campaign_circuit_breaker_open",
        "Whether a provider's circuit breaker is currently open (1) or not (0)",
    );
    let gauge = GaugeVec::new(opts, &["channel"]).expect("Failed to create circuit breaker gauge");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("Failed to register circuit breaker gauge");
    gauge
});

/// Encodes all registered metrics in Prometheus text format.
///
/// # Returns
///
/// Returns a String containing all metrics in Prometheus exposition format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to UTF-8")
}
