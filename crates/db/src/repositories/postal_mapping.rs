//! Postal mapping repository.

use std::sync::Arc;

use crate::entities::{PostalMapping, postal_mapping};
use kiezpoll_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, PaginatorTrait, Set,
};

/// What an upsert did to the mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new code was added.
    Created,
    /// An existing code was re-pointed to a different option.
    Updated,
    /// The code already pointed at the option.
    Unchanged,
}

/// Postal mapping repository for database operations.
#[derive(Clone)]
pub struct PostalMappingRepository {
    db: Arc<DatabaseConnection>,
}

impl PostalMappingRepository {
    /// Create a new postal mapping repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Exact lookup on a normalized code.
    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<postal_mapping::Model>> {
        PostalMapping::find_by_id(code)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Point a code at an option, inserting or re-pointing as needed.
    pub async fn upsert(&self, code: &str, option_id: &str) -> AppResult<UpsertOutcome> {
        match self.find_by_code(code).await? {
            Some(existing) if existing.option_id == option_id => Ok(UpsertOutcome::Unchanged),
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.option_id = Set(option_id.to_string());
                active
                    .update(self.db.as_ref())
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let model = postal_mapping::ActiveModel {
                    code: Set(code.to_string()),
                    option_id: Set(option_id.to_string()),
                };
                PostalMapping::insert(model)
                    .exec_without_returning(self.db.as_ref())
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(UpsertOutcome::Created)
            }
        }
    }

    /// Delete every mapping.
    pub async fn delete_all(&self) -> AppResult<u64> {
        let result = PostalMapping::delete_many()
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Number of mapped codes.
    pub async fn count(&self) -> AppResult<u64> {
        PostalMapping::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
