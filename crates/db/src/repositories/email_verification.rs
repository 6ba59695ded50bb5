//! Email verification code repository.

use std::sync::Arc;

use crate::entities::{EmailVerificationCode, email_verification_code};
use chrono::{DateTime, Utc};
use kiezpoll_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};

/// Email verification code repository for database operations.
#[derive(Clone)]
pub struct EmailVerificationRepository {
    db: Arc<DatabaseConnection>,
}

impl EmailVerificationRepository {
    /// Create a new email verification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Open a transaction on the underlying connection.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Persist a new code.
    pub async fn create(
        &self,
        model: email_verification_code::ActiveModel,
    ) -> AppResult<email_verification_code::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most recently issued unused, unexpired row matching email and code,
    /// locked until the transaction ends.
    pub async fn find_latest_valid_for_update<C: ConnectionTrait>(
        conn: &C,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<email_verification_code::Model>> {
        EmailVerificationCode::find()
            .filter(email_verification_code::Column::Email.eq(email))
            .filter(email_verification_code::Column::Code.eq(code))
            .filter(email_verification_code::Column::Used.eq(false))
            .filter(email_verification_code::Column::ExpiresAt.gt(now))
            .order_by_desc(email_verification_code::Column::CreatedAt)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a code used. Returns `false` if it was already consumed.
    pub async fn mark_used<C: ConnectionTrait>(conn: &C, id: &str) -> AppResult<bool> {
        let result = EmailVerificationCode::update_many()
            .col_expr(email_verification_code::Column::Used, Expr::value(true))
            .filter(email_verification_code::Column::Id.eq(id))
            .filter(email_verification_code::Column::Used.eq(false))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_mark_used_succeeds_once() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        assert!(EmailVerificationRepository::mark_used(&db, "c1").await.unwrap());
        assert!(!EmailVerificationRepository::mark_used(&db, "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_latest_valid_picks_first_row() {
        let now = Utc::now();
        let newest = email_verification_code::Model {
            id: "c2".to_string(),
            email: "a@example.com".to_string(),
            code: "000123".to_string(),
            created_at: now.into(),
            expires_at: (now + chrono::Duration::minutes(15)).into(),
            used: false,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[newest]])
            .into_connection();

        let found = EmailVerificationRepository::find_latest_valid_for_update(
            &db,
            "a@example.com",
            "000123",
            now,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(found.id, "c2");
    }
}
