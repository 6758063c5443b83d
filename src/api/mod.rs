//! API Module
//!
//! HTTP handlers and routing for the coordination server REST API.
//!
//! # Endpoints
//! - `PUT /cache/:ns` - Store a key-value pair in a namespace
//! - `GET /cache/:ns/:key` - Retrieve a value
//! - `DELETE /cache/:ns/:key` - Delete a key
//! - `DELETE /cache/:ns` - Invalidate a whole namespace
//! - `POST /lock/:resource` - Acquire a lock
//! - `DELETE /lock/:resource/:token` - Release a lock
//! - `POST /debounce/:key` - Debounce a call
//! - `GET /debounce/:key` - Count debounced firings
//! - `GET /stats` - Store statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
