//! Create `audience_category` and `audience_option` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AudienceCategory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AudienceCategory::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AudienceCategory::Name)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AudienceOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AudienceOption::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AudienceOption::CategoryId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AudienceOption::Name).string_len(100).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_audience_option_category")
                            .from(AudienceOption::Table, AudienceOption::CategoryId)
                            .to(AudienceCategory::Table, AudienceCategory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Option names are unique within their category
        manager
            .create_index(
                Index::create()
                    .name("idx_audience_option_category_name")
                    .table(AudienceOption::Table)
                    .col(AudienceOption::CategoryId)
                    .col(AudienceOption::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AudienceOption::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AudienceCategory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AudienceCategory {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum AudienceOption {
    Table,
    Id,
    CategoryId,
    Name,
}
