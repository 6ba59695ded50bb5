//! User membership repository.
//!
//! `(user_id, category_id)` is unique at the storage layer. Replacing a
//! membership is a single upsert against that index, so concurrent writers
//! serialise on the row and the last one wins.

use std::sync::Arc;

use crate::entities::{UserMembership, user_membership};
use kiezpoll_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::OnConflict,
};

/// Repository for user memberships.
#[derive(Clone)]
pub struct MembershipRepository {
    db: Arc<DatabaseConnection>,
}

impl MembershipRepository {
    /// Create a new membership repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All memberships of a user.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<user_membership::Model>> {
        UserMembership::find()
            .filter(user_membership::Column::UserId.eq(user_id))
            .order_by_asc(user_membership::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a membership, or point the user's existing row in the same
    /// category at the new option.
    pub async fn upsert(
        &self,
        model: user_membership::ActiveModel,
    ) -> AppResult<user_membership::Model> {
        UserMembership::insert(model)
            .on_conflict(
                OnConflict::columns([
                    user_membership::Column::UserId,
                    user_membership::Column::CategoryId,
                ])
                .update_columns([
                    user_membership::Column::OptionId,
                    user_membership::Column::CreatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
