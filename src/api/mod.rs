//! API Module
//!
//! HTTP handlers and routing for the admin REST API.
//!
//! # Endpoints
//! - `PUT /cache` - Store a JSON value
//! - `GET /cache/:key` - Retrieve a value by key
//! - `DELETE /cache/:key` - Delete a key
//! - `POST /rate-limit/check` - Run a rate limit check
//! - `DELETE /rate-limit/:policy/:key` - Reset a rate window
//! - `GET /stats` - Cache and rate limiter statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
