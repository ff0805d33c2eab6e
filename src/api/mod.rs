//! API Module
//!
//! HTTP handlers and routing for the operator-facing admin API.
//!
//! # Endpoints
//! - `GET /health` - L2 reachability of every instance
//! - `GET /stats` - Stats of every instance
//! - `GET /stats/:category` - Stats of one instance
//! - `DELETE /invalidate/:category?pattern=...` - Pattern invalidation

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
