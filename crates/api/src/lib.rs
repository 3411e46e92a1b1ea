//! HTTP API layer for f4f.
//!
//! - **Endpoints**: provider login round-trip, user directory, follow toggle
//!   and mutual-follow listing
//! - **Sessions**: server-side session store keyed by an opaque cookie
//! - **Middleware**: session resolution into request extensions
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod session;

pub use endpoints::router;
pub use session::{Session, SessionStore};
