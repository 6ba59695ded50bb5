//! Audience category and option repository.

use std::sync::Arc;

use crate::entities::{AudienceCategory, AudienceOption, audience_category, audience_option};
use kiezpoll_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

/// Repository for audience categories and their options.
#[derive(Clone)]
pub struct AudienceRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl AudienceRepository {
    /// Create a new audience repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Find a category by its exact name.
    pub async fn find_category_by_name(
        &self,
        name: &str,
    ) -> AppResult<Option<audience_category::Model>> {
        AudienceCategory::find()
            .filter(audience_category::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find categories by IDs.
    pub async fn find_categories_by_ids(
        &self,
        ids: &[String],
    ) -> AppResult<Vec<audience_category::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        AudienceCategory::find()
            .filter(audience_category::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(audience_category::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all categories ordered by name.
    pub async fn list_categories(&self) -> AppResult<Vec<audience_category::Model>> {
        AudienceCategory::find()
            .order_by_asc(audience_category::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a category by name, creating it if missing.
    ///
    /// Concurrent callers converge on the same row through the unique name.
    pub async fn find_or_create_category(&self, name: &str) -> AppResult<audience_category::Model> {
        if let Some(existing) = self.find_category_by_name(name).await? {
            return Ok(existing);
        }

        let model = audience_category::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(name.to_string()),
        };
        AudienceCategory::insert(model)
            .on_conflict(
                OnConflict::column(audience_category::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_category_by_name(name)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Category vanished after insert: {name}")))
    }

    /// Find an option by ID.
    pub async fn find_option_by_id(&self, id: &str) -> AppResult<Option<audience_option::Model>> {
        AudienceOption::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find options by IDs.
    pub async fn find_options_by_ids(
        &self,
        ids: &[String],
    ) -> AppResult<Vec<audience_option::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        AudienceOption::find()
            .filter(audience_option::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an option by category and exact name.
    pub async fn find_option(
        &self,
        category_id: &str,
        name: &str,
    ) -> AppResult<Option<audience_option::Model>> {
        AudienceOption::find()
            .filter(audience_option::Column::CategoryId.eq(category_id))
            .filter(audience_option::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all options, grouped by category and ordered by name.
    pub async fn list_options(&self) -> AppResult<Vec<audience_option::Model>> {
        AudienceOption::find()
            .order_by_asc(audience_option::Column::CategoryId)
            .order_by_asc(audience_option::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up an option within a category, creating it if missing.
    pub async fn find_or_create_option(
        &self,
        category_id: &str,
        name: &str,
    ) -> AppResult<audience_option::Model> {
        if let Some(existing) = self.find_option(category_id, name).await? {
            return Ok(existing);
        }

        let model = audience_option::ActiveModel {
            id: Set(self.id_gen.generate()),
            category_id: Set(category_id.to_string()),
            name: Set(name.to_string()),
        };
        AudienceOption::insert(model)
            .on_conflict(
                OnConflict::columns([
                    audience_option::Column::CategoryId,
                    audience_option::Column::Name,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_option(category_id, name)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Option vanished after insert: {name}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn category(id: &str, name: &str) -> audience_category::Model {
        audience_category::Model {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_or_create_category_returns_existing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[category("c1", "Bundesland")]])
                .into_connection(),
        );
        let repo = AudienceRepository::new(db);

        let result = repo.find_or_create_category("Bundesland").await.unwrap();

        assert_eq!(result.id, "c1");
    }

    #[tokio::test]
    async fn test_find_or_create_category_inserts_when_missing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // Lookup before insert: nothing
                .append_query_results([Vec::<audience_category::Model>::new()])
                // Lookup after insert
                .append_query_results([[category("c2", "Bundesland")]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let repo = AudienceRepository::new(db);

        let result = repo.find_or_create_category("Bundesland").await.unwrap();

        assert_eq!(result.name, "Bundesland");
    }
}
