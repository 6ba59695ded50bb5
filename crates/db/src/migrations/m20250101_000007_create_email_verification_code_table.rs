//! Create `email_verification_code` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailVerificationCode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailVerificationCode::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailVerificationCode::Email)
                            .string_len(254)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailVerificationCode::Code).string_len(6).not_null())
                    .col(
                        ColumnDef::new(EmailVerificationCode::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EmailVerificationCode::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailVerificationCode::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_verification_code_email")
                    .table(EmailVerificationCode::Table)
                    .col(EmailVerificationCode::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_verification_code_code")
                    .table(EmailVerificationCode::Table)
                    .col(EmailVerificationCode::Code)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailVerificationCode::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EmailVerificationCode {
    Table,
    Id,
    Email,
    Code,
    CreatedAt,
    ExpiresAt,
    Used,
}
