//! Request and Response models for the coordination server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{CacheSetRequest, DebounceRequest, LockRequest};
pub use responses::{
    CacheDeleteResponse, CacheGetResponse, CacheSetResponse, DebounceCountResponse,
    DebounceResponse, HealthResponse, InvalidateResponse, LockResponse, ReleaseResponse,
    StatsResponse,
};
