//! HTTP request handlers (route handlers).
//!
//! Only unauthenticated service endpoints are exposed.

/// `/health` and `/`
pub mod health;
