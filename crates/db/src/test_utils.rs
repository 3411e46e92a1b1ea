//! Test utilities for database operations.
//!
//! Provides a throwaway in-memory SQLite database with the full schema
//! applied, plus seeding helpers.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::entities::{follow_edge, user};
use crate::migrations::Migrator;

/// A migrated in-memory database, dropped together with its last connection.
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Create a fresh in-memory database and run all migrations.
    pub async fn new() -> Result<Self, DbErr> {
        // A single pooled connection: every new SQLite memory connection is a new database.
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;
        debug!("Created in-memory test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Shared handle to the connection, as the repositories expect it.
    #[must_use]
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    /// Insert a user directly.
    pub async fn seed_user(&self, external_id: &str, display_name: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            external_id: Set(external_id.to_string()),
            display_name: Set(display_name.to_string()),
            avatar_url: Set(Some(format!("https://pbs.example.com/{display_name}.png"))),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a follow edge directly.
    pub async fn seed_edge(
        &self,
        follower_id: i32,
        following_id: i32,
    ) -> Result<follow_edge::Model, DbErr> {
        follow_edge::ActiveModel {
            follower_id: Set(follower_id),
            following_id: Set(following_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn.as_ref())
        .await
    }
}
