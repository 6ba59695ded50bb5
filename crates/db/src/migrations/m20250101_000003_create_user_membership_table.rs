//! Create `user_membership` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserMembership::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserMembership::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserMembership::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(UserMembership::OptionId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(UserMembership::CategoryId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMembership::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_membership_user")
                            .from(UserMembership::Table, UserMembership::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_membership_option")
                            .from(UserMembership::Table, UserMembership::OptionId)
                            .to(AudienceOption::Table, AudienceOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_membership_category")
                            .from(UserMembership::Table, UserMembership::CategoryId)
                            .to(AudienceCategory::Table, AudienceCategory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one membership per user per category
        manager
            .create_index(
                Index::create()
                    .name("idx_user_membership_user_category")
                    .table(UserMembership::Table)
                    .col(UserMembership::UserId)
                    .col(UserMembership::CategoryId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_membership_option_id")
                    .table(UserMembership::Table)
                    .col(UserMembership::OptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserMembership::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserMembership {
    Table,
    Id,
    UserId,
    OptionId,
    CategoryId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum AudienceOption {
    Table,
    Id,
}

#[derive(Iden)]
enum AudienceCategory {
    Table,
    Id,
}
