//! Create `poll`, `poll_option`, and `poll_target` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Poll::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Poll::Question).text().not_null())
                    .col(ColumnDef::new(Poll::IsVisible).boolean().not_null().default(true))
                    // Legacy inline slots, kept until every poll has option rows
                    .col(ColumnDef::new(Poll::OptionOne).string_len(30))
                    .col(ColumnDef::new(Poll::OptionTwo).string_len(30))
                    .col(ColumnDef::new(Poll::OptionThree).string_len(30))
                    .col(ColumnDef::new(Poll::OptionOneCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Poll::OptionTwoCount).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Poll::OptionThreeCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_is_visible_created_at")
                    .table(Poll::Table)
                    .col(Poll::IsVisible)
                    .col(Poll::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOption::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollOption::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(PollOption::Text).string_len(200).not_null())
                    .col(ColumnDef::new(PollOption::Votes).integer().not_null().default(0))
                    .col(ColumnDef::new(PollOption::DisplayOrder).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_option_poll")
                            .from(PollOption::Table, PollOption::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Sequential order within a poll; also blocks a double backfill
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_option_poll_order")
                    .table(PollOption::Table)
                    .col(PollOption::PollId)
                    .col(PollOption::DisplayOrder)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollTarget::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollTarget::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollTarget::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(PollTarget::OptionId).string_len(32).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_target_poll")
                            .from(PollTarget::Table, PollTarget::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_target_option")
                            .from(PollTarget::Table, PollTarget::OptionId)
                            .to(AudienceOption::Table, AudienceOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_target_poll_option")
                    .table(PollTarget::Table)
                    .col(PollTarget::PollId)
                    .col(PollTarget::OptionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_target_option_id")
                    .table(PollTarget::Table)
                    .col(PollTarget::OptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollTarget::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PollOption::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Question,
    IsVisible,
    OptionOne,
    OptionTwo,
    OptionThree,
    OptionOneCount,
    OptionTwoCount,
    OptionThreeCount,
    CreatedAt,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
    PollId,
    Text,
    Votes,
    DisplayOrder,
}

#[derive(Iden)]
enum PollTarget {
    Table,
    Id,
    PollId,
    OptionId,
}

#[derive(Iden)]
enum AudienceOption {
    Table,
    Id,
}
