//! Throwaway Postgres databases for integration tests.
//!
//! Each [`TestDatabase`] is a freshly created, fully migrated database with a
//! random name, shared with repositories through an `Arc` the same way the
//! server shares its pool.

use std::sync::Arc;

use crate::migrations::Migrator;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Where the test server lives. Read from `TEST_DB_*`.
#[derive(Debug, Clone)]
pub struct TestServer {
    /// Host name.
    pub host: String,
    /// Port, 5433 by default to stay clear of a development server.
    pub port: u16,
    /// Role with `CREATEDB`.
    pub username: String,
    /// Password for `username`.
    pub password: String,
}

impl Default for TestServer {
    fn default() -> Self {
        let var = |key: &str, fallback: &str| {
            std::env::var(key).unwrap_or_else(|_| fallback.to_string())
        };
        Self {
            host: var("TEST_DB_HOST", "localhost"),
            port: var("TEST_DB_PORT", "5433").parse().unwrap_or(5433),
            username: var("TEST_DB_USER", "kiezpoll_test"),
            password: var("TEST_DB_PASSWORD", "kiezpoll_test"),
        }
    }
}

impl TestServer {
    /// URL of `database` on this server.
    #[must_use]
    pub fn url(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, database
        )
    }

    async fn admin(&self, sql: String) -> Result<(), DbErr> {
        let conn = Database::connect(&self.url("postgres")).await?;
        conn.execute(Statement::from_string(DatabaseBackend::Postgres, sql))
            .await?;
        conn.close().await
    }
}

/// A migrated database that exists for one test.
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
    server: TestServer,
    name: String,
}

impl TestDatabase {
    /// Create and migrate a database named `kiezpoll_test_<random>`.
    pub async fn create() -> Result<Self, DbErr> {
        let server = TestServer::default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("kiezpoll_test_{}", &suffix[..12]);

        server.admin(format!("CREATE DATABASE \"{name}\"")).await?;

        let conn = Database::connect(&server.url(&name)).await?;
        Migrator::up(&conn, None).await?;
        info!(database = %name, "Created test database");

        Ok(Self {
            conn: Arc::new(conn),
            server,
            name,
        })
    }

    /// Shared handle for building repositories.
    #[must_use]
    pub fn arc(&self) -> Arc<DatabaseConnection> {
        self.conn.clone()
    }

    /// Drop the database, closing any pooled connections still open on it.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        // Repositories built from `arc()` may still hold the pool.
        if let Ok(conn) = Arc::try_unwrap(self.conn) {
            conn.close().await?;
        }

        self.server
            .admin(format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.name))
            .await?;
        info!(database = %self.name, "Dropped test database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url() {
        let server = TestServer {
            host: "db".to_string(),
            port: 5433,
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(server.url("kiez"), "postgres://user:pass@db:5433/kiez");
    }
}
