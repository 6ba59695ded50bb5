//! Create `postal_mapping` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostalMapping::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostalMapping::Code)
                            .string_len(16)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostalMapping::OptionId).string_len(32).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_postal_mapping_option")
                            .from(PostalMapping::Table, PostalMapping::OptionId)
                            .to(AudienceOption::Table, AudienceOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostalMapping::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PostalMapping {
    Table,
    Code,
    OptionId,
}

#[derive(Iden)]
enum AudienceOption {
    Table,
    Id,
}
