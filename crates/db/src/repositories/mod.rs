//! Repositories over the database entities.

mod follow_edge;
mod user;

pub use follow_edge::FollowEdgeRepository;
pub use user::UserRepository;

use sea_orm::{DbErr, SqlErr};

/// Whether a database error was raised by a unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
