//! Poll repository.

use std::sync::Arc;

use crate::entities::{Poll, PollTarget, audience_option, poll, poll_target};
use kiezpoll_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    TransactionTrait,
};

#[derive(Debug, FromQueryResult)]
struct CategoryIdRow {
    category_id: String,
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
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

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PollNotFound(id.to_string()))
    }

    /// Find a poll and lock its row until the transaction ends.
    pub async fn find_for_update<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All polls with the visibility flag set, newest first.
    pub async fn find_visible(&self) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::IsVisible.eq(true))
            .order_by_desc(poll::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a poll row.
    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: poll::ActiveModel,
    ) -> AppResult<poll::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Target rows of the given polls.
    pub async fn find_targets(&self, poll_ids: &[String]) -> AppResult<Vec<poll_target::Model>> {
        if poll_ids.is_empty() {
            return Ok(vec![]);
        }

        PollTarget::find()
            .filter(poll_target::Column::PollId.is_in(poll_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Drop all targets of a poll.
    pub async fn delete_targets<C: ConnectionTrait>(conn: &C, poll_id: &str) -> AppResult<u64> {
        let result = PollTarget::delete_many()
            .filter(poll_target::Column::PollId.eq(poll_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Insert target rows.
    pub async fn insert_targets<C: ConnectionTrait>(
        conn: &C,
        models: Vec<poll_target::ActiveModel>,
    ) -> AppResult<()> {
        if models.is_empty() {
            return Ok(());
        }

        PollTarget::insert_many(models)
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Distinct categories targeted by at least one visible poll.
    ///
    /// Derived from current poll state on every call.
    pub async fn find_required_category_ids(&self) -> AppResult<Vec<String>> {
        let rows = PollTarget::find()
            .select_only()
            .column(audience_option::Column::CategoryId)
            .distinct()
            .join(JoinType::InnerJoin, poll_target::Relation::AudienceOption.def())
            .join(JoinType::InnerJoin, poll_target::Relation::Poll.def())
            .filter(poll::Column::IsVisible.eq(true))
            .into_model::<CategoryIdRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.category_id).collect())
    }
}
