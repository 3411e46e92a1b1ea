//! Database entities.

#![allow(missing_docs)]

pub mod follow_edge;
pub mod user;

pub use follow_edge::Entity as FollowEdge;
pub use user::Entity as User;
