//! Persistence services.
//!
//! Services hold the row-level reads and writes for each entity, separated
//! from HTTP handlers. Every function takes the connection of a scoped
//! [`Session`](crate::session::Session).

pub mod api_key_service;
pub mod qr_code_service;
pub mod user_service;
