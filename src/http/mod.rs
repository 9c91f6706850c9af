//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, timeout)
//!     → GET /liveness → health::CheckLiveness
//!     → 204 No Content | 500 Internal Server Error
//! ```

pub mod server;

pub use server::{build_router, HttpServer};
