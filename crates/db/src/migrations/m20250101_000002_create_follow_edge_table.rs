//! Create follow edge table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FollowEdge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowEdge::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FollowEdge::FollowerId).integer().not_null())
                    .col(ColumnDef::new(FollowEdge::FollowingId).integer().not_null())
                    .col(
                        ColumnDef::new(FollowEdge::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_follower")
                            .from(FollowEdge::Table, FollowEdge::FollowerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_following")
                            .from(FollowEdge::Table, FollowEdge::FollowingId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (follower_id, following_id) - at most one edge per directed pair
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_follower_following")
                    .table(FollowEdge::Table)
                    .col(FollowEdge::FollowerId)
                    .col(FollowEdge::FollowingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: following_id (for follower lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_following_id")
                    .table(FollowEdge::Table)
                    .col(FollowEdge::FollowingId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowEdge::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FollowEdge {
    Table,
    Id,
    FollowerId,
    FollowingId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
