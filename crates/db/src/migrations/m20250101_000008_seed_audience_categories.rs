//! Seed the default audience categories and the Berlin city option.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // gen_random_uuid() is built in from PostgreSQL 13; hex form fits string_len(32)
        manager
            .get_connection()
            .execute_unprepared(
                r"
                INSERT INTO audience_category (id, name)
                SELECT replace(gen_random_uuid()::text, '-', ''), name
                FROM (VALUES ('State'), ('City'), ('Berlin Bezirk'), ('Bundesland')) AS seed(name)
                ON CONFLICT (name) DO NOTHING;
                ",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r"
                INSERT INTO audience_option (id, category_id, name)
                SELECT replace(gen_random_uuid()::text, '-', ''), c.id, 'Berlin'
                FROM audience_category c
                WHERE c.name = 'City'
                ON CONFLICT (category_id, name) DO NOTHING;
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // Seed rows may be referenced by memberships and polls; leave them.
        Ok(())
    }
}
