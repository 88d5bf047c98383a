//! Liveness and informational endpoints.
//!
//! Neither endpoint touches the database: a liveness probe must answer even
//! while the store is down.

use axum::Json;
use chrono::Utc;
use serde::Serialize;

/// API version reported by `/health`.
pub const API_VERSION: &str = "1.0.0";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the process can answer
    pub status: &'static str,

    /// Current server time as fractional Unix seconds
    pub timestamp: f64,

    pub version: &'static str,
}

/// Root endpoint response.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub docs: &'static str,
    pub status: &'static str,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": 1771286249.345811,
///   "version": "1.0.0"
/// }
/// ```
pub async fn health_check() -> Json<HealthResponse> {
    let now = Utc::now();

    Json(HealthResponse {
        status: "healthy",
        timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
        version: API_VERSION,
    })
}

/// API root handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "message": "Welcome to the QR Code Generator API",
///   "docs": "/docs",
///   "status": "online"
/// }
/// ```
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Welcome to the QR Code Generator API",
        docs: "/docs",
        status: "online",
    })
}
