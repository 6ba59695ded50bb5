//! Poll option repository.
//!
//! Vote counters only change through single-statement arithmetic updates so
//! concurrent voters never lose an increment.

use std::sync::Arc;

use crate::entities::{PollOption, poll_option};
use kiezpoll_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::Expr,
};

/// Poll option repository for database operations.
#[derive(Clone)]
pub struct PollOptionRepository {
    db: Arc<DatabaseConnection>,
}

impl PollOptionRepository {
    /// Create a new poll option repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Options of a poll in display order.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        Self::find_by_poll_in(self.db.as_ref(), poll_id).await
    }

    /// Options of a poll in display order, on an explicit connection.
    pub async fn find_by_poll_in<C: ConnectionTrait>(
        conn: &C,
        poll_id: &str,
    ) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::DisplayOrder)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Options of several polls.
    pub async fn find_by_polls(&self, poll_ids: &[String]) -> AppResult<Vec<poll_option::Model>> {
        if poll_ids.is_empty() {
            return Ok(vec![]);
        }

        PollOption::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids.to_vec()))
            .order_by_asc(poll_option::Column::PollId)
            .order_by_asc(poll_option::Column::DisplayOrder)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert option rows.
    pub async fn insert_many<C: ConnectionTrait>(
        conn: &C,
        models: Vec<poll_option::ActiveModel>,
    ) -> AppResult<()> {
        if models.is_empty() {
            return Ok(());
        }

        PollOption::insert_many(models)
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Increment an option's counter atomically (single UPDATE query, no fetch).
    pub async fn increment_votes<C: ConnectionTrait>(conn: &C, option_id: &str) -> AppResult<()> {
        PollOption::update_many()
            .col_expr(
                poll_option::Column::Votes,
                Expr::col(poll_option::Column::Votes).add(1),
            )
            .filter(poll_option::Column::Id.eq(option_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Decrement an option's counter atomically, never below zero.
    pub async fn decrement_votes<C: ConnectionTrait>(conn: &C, option_id: &str) -> AppResult<()> {
        PollOption::update_many()
            .col_expr(poll_option::Column::Votes, Expr::cust("GREATEST(votes - 1, 0)"))
            .filter(poll_option::Column::Id.eq(option_id))
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
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn option(id: &str, order: i32, votes: i32) -> poll_option::Model {
        poll_option::Model {
            id: id.to_string(),
            poll_id: "p1".to_string(),
            text: format!("Option {order}"),
            votes,
            display_order: order,
        }
    }

    #[tokio::test]
    async fn test_find_by_poll() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[option("o1", 0, 3), option("o2", 1, 0)]])
                .into_connection(),
        );
        let repo = PollOptionRepository::new(db);

        let options = repo.find_by_poll("p1").await.unwrap();

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, "o1");
        assert_eq!(options[1].display_order, 1);
    }

    #[tokio::test]
    async fn test_find_by_polls_empty_input_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = PollOptionRepository::new(db);

        assert!(repo.find_by_polls(&[]).await.unwrap().is_empty());
    }
}
