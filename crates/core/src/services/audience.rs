//! Audience catalogue service.

use std::collections::HashMap;

use kiezpoll_common::{AppError, AppResult};
use kiezpoll_db::{
    entities::{audience_category, audience_option},
    repositories::AudienceRepository,
};
use serde::Serialize;

/// A category with its selectable options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithOptions {
    pub category: audience_category::Model,
    pub options: Vec<audience_option::Model>,
}

/// Trim a category or option name, rejecting empty and overlong ones.
fn clean_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::Validation(
            "Name must be between 1 and 100 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Audience service for business logic.
#[derive(Clone)]
pub struct AudienceService {
    audience_repo: AudienceRepository,
}

impl AudienceService {
    /// Create a new audience service.
    #[must_use]
    pub const fn new(audience_repo: AudienceRepository) -> Self {
        Self { audience_repo }
    }

    /// Every category with its options, both ordered by name.
    pub async fn list_categories(&self) -> AppResult<Vec<CategoryWithOptions>> {
        let categories = self.audience_repo.list_categories().await?;

        let mut by_category: HashMap<String, Vec<audience_option::Model>> = HashMap::new();
        for option in self.audience_repo.list_options().await? {
            by_category
                .entry(option.category_id.clone())
                .or_default()
                .push(option);
        }

        Ok(categories
            .into_iter()
            .map(|category| CategoryWithOptions {
                options: by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }

    /// Look up or create a category.
    pub async fn create_category(&self, name: &str) -> AppResult<audience_category::Model> {
        let name = clean_name(name)?;
        self.audience_repo.find_or_create_category(&name).await
    }

    /// Look up or create an option within an existing category.
    pub async fn create_option(
        &self,
        category_id: &str,
        name: &str,
    ) -> AppResult<audience_option::Model> {
        let name = clean_name(name)?;
        let exists = !self
            .audience_repo
            .find_categories_by_ids(&[category_id.to_string()])
            .await?
            .is_empty();
        if !exists {
            return Err(AppError::NotFound(format!("Category {category_id}")));
        }
        self.audience_repo.find_or_create_option(category_id, &name).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn category(id: &str, name: &str) -> audience_category::Model {
        audience_category::Model {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn option(id: &str, category_id: &str, name: &str) -> audience_option::Model {
        audience_option::Model {
            id: id.to_string(),
            category_id: category_id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_categories_groups_options() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[category("c1", "Berlin Bezirk"), category("c2", "State")]])
            .append_query_results([[
                option("o1", "c1", "Mitte"),
                option("o2", "c1", "Pankow"),
            ]])
            .into_connection();
        let service = AudienceService::new(AudienceRepository::new(Arc::new(db)));

        let listed = service.list_categories().await.unwrap();

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].options.len(), 2);
        assert!(listed[1].options.is_empty());
    }

    #[tokio::test]
    async fn test_create_option_unknown_category() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<audience_category::Model>::new()])
            .into_connection();
        let service = AudienceService::new(AudienceRepository::new(Arc::new(db)));

        let result = service.create_option("missing", "Mitte").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  Mitte ").unwrap(), "Mitte");
        assert!(clean_name("   ").is_err());
    }
}
