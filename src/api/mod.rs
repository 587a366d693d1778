//! HTTP surface of the trust oracle
//!
//! - Analysis API (run, fetch, verify, document intake)
//! - Secure HTTP client for collaborator calls
//! - Security middleware (auth, rate limiting, body limit, headers, logging)

pub mod analysis;
pub mod http;
pub mod middleware;

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state};
use tower_http::trace::TraceLayer;

pub use analysis::{AnalysisApiState, AnalyzeRequest, ApiError, create_router};
pub use http::{HttpSecurityConfig, SecureHttpClient};
pub use middleware::{
    RateLimiter, SecurityMiddlewareConfig, SecurityState, auth_middleware, body_size_middleware,
    logging_middleware, rate_limit_middleware, security_headers_middleware,
};

/// Analysis routes wrapped in the security middleware stack
pub fn build_app(state: AnalysisApiState, security: SecurityState) -> Router {
    // Layers run bottom-up: tracing first, body size check last
    create_router(state)
        .layer(from_fn_with_state(security.clone(), body_size_middleware))
        .layer(from_fn_with_state(security.clone(), auth_middleware))
        .layer(from_fn_with_state(security.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(security, logging_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
}
