//! Vote repository.

use std::sync::Arc;

use crate::entities::{Vote, vote};
use chrono::Utc;
use kiezpoll_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, TransactionTrait, sea_query::Expr, sea_query::OnConflict,
};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
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

    /// Find a user's vote on a poll.
    pub async fn find_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.eq(poll_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user's vote on a poll and lock the row until the transaction ends.
    pub async fn find_for_update<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.eq(poll_id))
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a vote unless one already exists for `(user_id, poll_id)`.
    ///
    /// Returns `false` when a concurrent transaction inserted first; the
    /// statement waits for that transaction rather than raising a
    /// uniqueness error.
    pub async fn insert_if_absent<C: ConnectionTrait>(
        conn: &C,
        model: vote::ActiveModel,
    ) -> AppResult<bool> {
        let inserted = Vote::insert(model)
            .on_conflict(
                OnConflict::columns([vote::Column::UserId, vote::Column::PollId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(inserted > 0)
    }

    /// Point an existing vote at a different option.
    pub async fn repoint<C: ConnectionTrait>(
        conn: &C,
        vote_id: &str,
        option_id: &str,
    ) -> AppResult<()> {
        Vote::update_many()
            .col_expr(vote::Column::OptionId, Expr::value(option_id))
            .col_expr(vote::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(vote::Column::Id.eq(vote_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn new_vote() -> vote::ActiveModel {
        vote::ActiveModel {
            id: Set("v1".to_string()),
            user_id: Set("u1".to_string()),
            poll_id: Set("p1".to_string()),
            option_id: Set("o1".to_string()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_reports_insert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        assert!(VoteRepository::insert_if_absent(&db, new_vote()).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_if_absent_reports_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        assert!(!VoteRepository::insert_if_absent(&db, new_vote()).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_user_and_poll_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vote::Model>::new()])
                .into_connection(),
        );
        let repo = VoteRepository::new(db);

        let result = repo.find_by_user_and_poll("u1", "p1").await.unwrap();

        assert!(result.is_none());
    }
}
