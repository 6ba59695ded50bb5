//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_audience_tables;
mod m20250101_000003_create_user_membership_table;
mod m20250101_000004_create_postal_mapping_table;
mod m20250101_000005_create_poll_tables;
mod m20250101_000006_create_vote_table;
mod m20250101_000007_create_email_verification_code_table;
mod m20250101_000008_seed_audience_categories;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_audience_tables::Migration),
            Box::new(m20250101_000003_create_user_membership_table::Migration),
            Box::new(m20250101_000004_create_postal_mapping_table::Migration),
            Box::new(m20250101_000005_create_poll_tables::Migration),
            Box::new(m20250101_000006_create_vote_table::Migration),
            Box::new(m20250101_000007_create_email_verification_code_table::Migration),
            Box::new(m20250101_000008_seed_audience_categories::Migration),
        ]
    }
}
