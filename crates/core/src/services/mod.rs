//! Business logic services.

#![allow(missing_docs)]

pub mod follow_sync;
pub mod identity;
pub mod remote_graph;
pub mod user;

pub use follow_sync::{AnnotatedUser, FollowAction, FollowSyncService, ToggleOutcome};
pub use identity::{HttpIdentityProvider, IdentityProvider, IdentityProviderClient, LoginProfile};
pub use remote_graph::{
    HttpRemoteGraph, RemoteCredential, RemoteGraph, RemoteGraphClient, RemoteGraphError,
};
pub use user::UserService;
