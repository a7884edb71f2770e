//! # Application State Management
//!
//! Shared state accessed by every HTTP request handler and ingestion session.
//! Uses the `Arc<RwLock<T>>` pattern throughout: multiple handlers can read
//! simultaneously, one can write at a time, and the lock is held only long
//! enough to copy data out.
//!
//! Pipeline counters live here rather than in the sessions themselves so the
//! metrics surface sees one process-wide view while the windows and session
//! flags stay connection-local.

use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request and pipeline metrics (updated by middleware and sessions)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Metrics collected across all HTTP requests and ingestion sessions.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of request errors since server start
    pub error_count: u64,

    /// Current number of live WebSocket ingestion sessions
    pub active_sessions: u32,

    /// Media messages received (buffered or not)
    pub fragments_received: u64,

    /// Media messages dropped (idle session or decode failure)
    pub fragments_dropped: u64,

    /// Renders committed to the sink
    pub renders_completed: u64,

    /// Renders that failed at mux or sink stage
    pub render_failures: u64,

    /// Duration of the most recent successful render, in milliseconds
    pub last_render_ms: u64,

    /// Per-endpoint request statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Request statistics for a single endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the read lock immediately so other threads are never
    /// blocked on a handler still holding config.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn increment_active_sessions(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions += 1;
    }

    pub fn decrement_active_sessions(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_sessions > 0 {
            metrics.active_sessions -= 1;
        }
    }

    /// Count one inbound media message, buffered or not.
    pub fn record_fragment_received(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.fragments_received += 1;
    }

    /// Count a media message that never reached the window.
    pub fn record_fragment_dropped(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.fragments_dropped += 1;
    }

    /// Record a committed render and how long it took.
    pub fn record_render_completed(&self, duration_ms: u64) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.renders_completed += 1;
        metrics.last_render_ms = duration_ms;
    }

    pub fn record_render_failed(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.render_failures += 1;
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Clones everything out under one read lock so the JSON response never
    /// sees half-updated counters.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_sessions: metrics.active_sessions,
            fragments_received: metrics.fragments_received,
            fragments_dropped: metrics.fragments_dropped,
            renders_completed: metrics.renders_completed,
            render_failures: metrics.render_failures,
            last_render_ms: metrics.last_render_ms,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_counters() {
        let state = AppState::new(AppConfig::default());

        state.record_fragment_received();
        state.record_fragment_received();
        state.record_fragment_dropped();
        state.record_render_completed(12);
        state.record_render_failed();

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.fragments_received, 2);
        assert_eq!(snapshot.fragments_dropped, 1);
        assert_eq!(snapshot.renders_completed, 1);
        assert_eq!(snapshot.render_failures, 1);
        assert_eq!(snapshot.last_render_ms, 12);
    }

    #[test]
    fn test_active_sessions_never_underflow() {
        let state = AppState::new(AppConfig::default());
        state.decrement_active_sessions();
        assert_eq!(state.get_metrics_snapshot().active_sessions, 0);

        state.increment_active_sessions();
        state.increment_active_sessions();
        state.decrement_active_sessions();
        assert_eq!(state.get_metrics_snapshot().active_sessions, 1);
    }

    #[test]
    fn test_endpoint_metrics_accumulate() {
        let state = AppState::new(AppConfig::default());
        state.record_endpoint_request("GET /health", 5, false);
        state.record_endpoint_request("GET /health", 15, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["GET /health"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.error_count, 1);
        assert!((metric.average_duration_ms() - 10.0).abs() < f64::EPSILON);
        assert!((metric.error_rate() - 0.5).abs() < f64::EPSILON);
    }
}
