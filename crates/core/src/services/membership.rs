//! Audience membership service.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use kiezpoll_common::{AppError, AppResult, IdGenerator};
use kiezpoll_db::{
    entities::{audience_option, user_membership},
    repositories::{AudienceRepository, MembershipRepository},
};
use sea_orm::Set;
use serde::Serialize;

use super::geo::GeoLookupService;

/// A membership with category and option names attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipView {
    pub category_id: String,
    pub category_name: String,
    pub option_id: String,
    pub option_name: String,
}

/// Membership service for business logic.
#[derive(Clone)]
pub struct MembershipService {
    membership_repo: MembershipRepository,
    audience_repo: AudienceRepository,
    geo: GeoLookupService,
    id_gen: IdGenerator,
}

impl MembershipService {
    /// Create a new membership service.
    #[must_use]
    pub const fn new(
        membership_repo: MembershipRepository,
        audience_repo: AudienceRepository,
        geo: GeoLookupService,
    ) -> Self {
        Self {
            membership_repo,
            audience_repo,
            geo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Make `option_id` the user's only membership in its category.
    ///
    /// Replaces any existing membership in that category; calling it twice
    /// with the same option leaves a single row. Concurrent calls for the
    /// same category never fail on uniqueness, the last write wins.
    pub async fn set_membership(
        &self,
        user_id: &str,
        option_id: &str,
    ) -> AppResult<user_membership::Model> {
        let option = self
            .audience_repo
            .find_option_by_id(option_id)
            .await?
            .ok_or_else(|| AppError::Validation("Please select an option".to_string()))?;

        self.replace(user_id, &option).await
    }

    async fn replace(
        &self,
        user_id: &str,
        option: &audience_option::Model,
    ) -> AppResult<user_membership::Model> {
        let model = user_membership::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            option_id: Set(option.id.clone()),
            category_id: Set(option.category_id.clone()),
            created_at: Set(Utc::now().into()),
        };
        let membership = self.membership_repo.upsert(model).await?;

        tracing::info!(user_id = %user_id, option_id = %option.id, category_id = %option.category_id, "Membership set");
        Ok(membership)
    }

    /// The user's memberships, one per category.
    pub async fn get_memberships(&self, user_id: &str) -> AppResult<Vec<MembershipView>> {
        let memberships = self.membership_repo.find_by_user(user_id).await?;
        if memberships.is_empty() {
            return Ok(vec![]);
        }

        let option_ids: Vec<String> = memberships.iter().map(|m| m.option_id.clone()).collect();
        let options: HashMap<String, audience_option::Model> = self
            .audience_repo
            .find_options_by_ids(&option_ids)
            .await?
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();

        let category_ids: Vec<String> = memberships.iter().map(|m| m.category_id.clone()).collect();
        let category_names: HashMap<String, String> = self
            .audience_repo
            .find_categories_by_ids(&category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut seen = HashSet::new();
        let views = memberships
            .into_iter()
            .filter(|m| seen.insert(m.category_id.clone()))
            .filter_map(|m| {
                let option = options.get(&m.option_id)?;
                Some(MembershipView {
                    category_name: category_names.get(&m.category_id).cloned().unwrap_or_default(),
                    category_id: m.category_id,
                    option_id: m.option_id,
                    option_name: option.name.clone(),
                })
            })
            .collect();

        Ok(views)
    }

    /// Derive and store a membership from a postal code.
    ///
    /// Returns the assigned option, or `None` when the code maps nowhere or
    /// the assignment fails. Never fails the caller.
    pub async fn assign_from_postal(
        &self,
        user_id: &str,
        postal_code: &str,
    ) -> Option<audience_option::Model> {
        let resolved = self.geo.resolve_postal(postal_code).await?;

        match self.replace(user_id, &resolved.option).await {
            Ok(_) => Some(resolved.option),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to assign membership from postal code");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kiezpoll_db::entities::audience_category;
    use kiezpoll_db::repositories::PostalMappingRepository;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> MembershipService {
        let db = Arc::new(db);
        let audience_repo = AudienceRepository::new(db.clone());
        MembershipService::new(
            MembershipRepository::new(db.clone()),
            audience_repo.clone(),
            GeoLookupService::with_default_chain(
                PostalMappingRepository::new(db),
                audience_repo,
                None,
            ),
        )
    }

    fn option(id: &str, category_id: &str, name: &str) -> audience_option::Model {
        audience_option::Model {
            id: id.to_string(),
            category_id: category_id.to_string(),
            name: name.to_string(),
        }
    }

    fn membership(id: &str, option_id: &str, category_id: &str) -> user_membership::Model {
        user_membership::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            option_id: option_id.to_string(),
            category_id: category_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_set_membership_unknown_option() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<audience_option::Model>::new()])
            .into_connection();

        let result = service(db).set_membership("u1", "missing").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_set_membership_replaces_in_category() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[option("opt-pankow", "cat-bezirk", "Pankow")]])
            .append_query_results([[membership("m1", "opt-pankow", "cat-bezirk")]])
            .into_connection();

        let result = service(db).set_membership("u1", "opt-pankow").await.unwrap();

        // The existing row keeps its id and now points at the new option.
        assert_eq!(result.id, "m1");
        assert_eq!(result.option_id, "opt-pankow");
        assert_eq!(result.category_id, "cat-bezirk");
    }

    #[tokio::test]
    async fn test_get_memberships_one_per_category() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                membership("m1", "opt-mitte", "cat-bezirk"),
                membership("m2", "opt-berlin", "cat-land"),
            ]])
            .append_query_results([[
                option("opt-mitte", "cat-bezirk", "Mitte"),
                option("opt-berlin", "cat-land", "Berlin"),
            ]])
            .append_query_results([[
                audience_category::Model {
                    id: "cat-bezirk".to_string(),
                    name: "Berlin Bezirk".to_string(),
                },
                audience_category::Model {
                    id: "cat-land".to_string(),
                    name: "Bundesland".to_string(),
                },
            ]])
            .into_connection();

        let views = service(db).get_memberships("u1").await.unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].category_name, "Berlin Bezirk");
        assert_eq!(views[0].option_name, "Mitte");
        assert_eq!(views[1].option_name, "Berlin");
    }

    #[tokio::test]
    async fn test_assign_from_postal_unresolvable() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        assert!(service(db).assign_from_postal("u1", "---").await.is_none());
    }
}
