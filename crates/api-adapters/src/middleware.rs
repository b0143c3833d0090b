//! Cross-cutting layers applied to every route.

use axum::http::{header, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{HttpMakeClassifier, TraceLayer},
};

/// One span per request with method, path and status.
pub fn request_tracing() -> TraceLayer<HttpMakeClassifier> {
    TraceLayer::new_for_http()
}

// The web client may be served from another origin.
pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}
