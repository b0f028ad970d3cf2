//! Axum HTTP API server for the Sentinel detection backend.
//!
//! This crate provides:
//! - Request/response contracts for detect / zones / occupancy / stream ops
//! - The shared application context (no mutable globals)
//! - CORS and request-logging middleware
//! - Error mapping onto HTTP statuses

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
