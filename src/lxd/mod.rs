//! Control-plane integration.
//!
//! # Data Flow
//! ```text
//! REST API (client.rs):
//!     Unix socket → HTTP/1.1 → response envelope (types.rs)
//!     → async operations followed via {operation}/wait
//!
//! Database (database.rs):
//!     `lxd cluster list-database` → table scrape → member addresses
//! ```
//!
//! # Design Decisions
//! - The API is the source of truth; the database read only exists for
//!   the window where the daemon cannot answer
//! - Both paths carry explicit timeouts

pub mod client;
pub mod database;
pub mod types;

pub use client::LxdClient;
pub use database::{DatabaseError, DatabaseLister};
pub use types::{Instance, LxdError, LxdResult, Response, StateRequest};
