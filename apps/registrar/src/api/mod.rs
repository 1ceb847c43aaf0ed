//! # Registrar HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /api/students` - List every student
//! - `POST /api/students` - Enroll a student into semester 1
//! - `GET /api/students/{index}` - Get one student
//! - `PUT /api/students/{index}` - Update a student's names
//! - `DELETE /api/students/{index}` - Delete a student
//! - `POST /api/promotions` - Move a whole semester
//! - `GET /api/studies` - List studies
//! - `POST /api/studies` - Add a study
//! - `GET /status` - Record counts
//! - `GET /health` - Health check
//!
//! ## Security Configuration
//!
//! - `cors_origins` / `REGISTRAR_CORS_ORIGINS`: allowed origins, or "*" for
//!   all (default: localhost only)
//! - `rate_limit` / `REGISTRAR_RATE_LIMIT`: requests per second (default:
//!   100, 0 to disable)

mod handlers;
mod middleware;
mod types;

pub use handlers::{ApiError, status_for};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    DeleteResponse, EnrollBody, ErrorResponse, HealthResponse, PromoteBody, StatusResponse,
    StudentListResponse, StudyBody, StudyJson, UpdateBody, parse_date, to_semester,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use registrar_core::{RegistrarError, Registry};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. The registry synchronizes its own writers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer.
///
/// - `None`: localhost only
/// - a list containing `"*"`: every origin
/// - otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some(list) if list.iter().any(|o| o == "*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(list) => {
            let allowed_origins: Vec<HeaderValue> = list
                .iter()
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", s);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(ALLOWED_METHODS)
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - protects against floods (if enabled)
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let cors = build_cors_layer(server.cors_origins.as_deref());

    let rate_limiter = if server.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", server.rate_limit);
        Some(create_rate_limiter(server.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/api/students",
            get(handlers::list_students_handler).post(handlers::enroll_handler),
        )
        .route(
            "/api/students/{index}",
            get(handlers::get_student_handler)
                .put(handlers::update_student_handler)
                .delete(handlers::delete_student_handler),
        )
        .route("/api/promotions", post(handlers::promote_handler))
        .route(
            "/api/studies",
            get(handlers::list_studies_handler).post(handlers::add_study_handler),
        );

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn run_server(registry: Registry, server: &ServerConfig) -> Result<(), RegistrarError> {
    let addr = format!("{}:{}", server.host, server.port);
    let router = create_router(AppState::new(registry), server);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RegistrarError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Registrar HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RegistrarError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_with_every_cors_mode() {
        let mut server = ServerConfig::default();
        let _ = create_router(AppState::new(Registry::new()), &server);

        server.cors_origins = Some(vec!["*".to_string()]);
        server.rate_limit = 0;
        let _ = create_router(AppState::new(Registry::new()), &server);

        server.cors_origins = Some(vec!["http://example.test".to_string()]);
        let _ = create_router(AppState::new(Registry::new()), &server);
    }
}
