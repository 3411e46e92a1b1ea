//! Core business logic for f4f.
//!
//! - **Follow synchronization**: toggling follow edges in step with the
//!   provider's social graph, plus the listing and mutual-follow queries
//! - **User directory**: login upserts and lookups
//! - **Provider boundaries**: the remote graph client and the OAuth identity
//!   provider, each a trait with an HTTP implementation

pub mod services;

pub use services::*;
