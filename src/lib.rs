//! QR Code Generator API
//!
//! Persistence scaffold for a QR code service: accounts, API keys and QR code
//! records stored in PostgreSQL, plus the HTTP shell that serves them.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries, embedded migrations)
//! - **Configuration**: environment variables via envy, optional `.env` via dotenvy
//! - **Format**: JSON requests/responses

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod session;

use tracing_subscriber::EnvFilter;

/// Initialize logging with tracing subscriber.
///
/// Reads the RUST_LOG environment variable, defaulting to "info".
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
