//! # Request/Response Tracing
//!
//! `tower_http::trace::TraceLayer` around the whole pipeline, so redirects,
//! challenges and panics all get a request span.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;

/// Each request gets a span with method and URI; 5xx responses are
/// recorded as failures.
pub fn layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
