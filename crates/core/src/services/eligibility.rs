//! Eligibility evaluation.
//!
//! The required categories are the ones targeted by at least one visible
//! poll, recomputed from current poll state on every evaluation. A user is
//! complete when they hold exactly one membership in each required category.

use std::collections::{BTreeSet, HashMap};

use kiezpoll_common::{AppError, AppResult};
use kiezpoll_db::repositories::{AudienceRepository, MembershipRepository, PollRepository};

/// Required categories the user does not hold exactly one membership in.
///
/// `membership_categories` has one entry per membership row, so a category
/// held twice appears twice and is reported as unsatisfied.
#[must_use]
pub fn unsatisfied_categories<'a>(
    required: &'a BTreeSet<String>,
    membership_categories: &[String],
) -> Vec<&'a String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for category_id in membership_categories {
        *counts.entry(category_id.as_str()).or_default() += 1;
    }

    required
        .iter()
        .filter(|category_id| counts.get(category_id.as_str()).copied() != Some(1))
        .collect()
}

/// Eligibility service.
#[derive(Clone)]
pub struct EligibilityService {
    poll_repo: PollRepository,
    membership_repo: MembershipRepository,
    audience_repo: AudienceRepository,
}

impl EligibilityService {
    /// Create a new eligibility service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        membership_repo: MembershipRepository,
        audience_repo: AudienceRepository,
    ) -> Self {
        Self {
            poll_repo,
            membership_repo,
            audience_repo,
        }
    }

    async fn unsatisfied_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let required: BTreeSet<String> = self
            .poll_repo
            .find_required_category_ids()
            .await?
            .into_iter()
            .collect();
        if required.is_empty() {
            return Ok(vec![]);
        }

        let held: Vec<String> = self
            .membership_repo
            .find_by_user(user_id)
            .await?
            .into_iter()
            .map(|m| m.category_id)
            .collect();

        Ok(unsatisfied_categories(&required, &held)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Whether the user's memberships cover every required category exactly once.
    pub async fn is_complete(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.unsatisfied_ids(user_id).await?.is_empty())
    }

    /// Names of the required categories the user still has to fill in, sorted.
    pub async fn missing_categories(&self, user_id: &str) -> AppResult<Vec<String>> {
        let ids = self.unsatisfied_ids(user_id).await?;
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut names: Vec<String> = self
            .audience_repo
            .find_categories_by_ids(&ids)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Fail with [`AppError::EligibilityIncomplete`] unless the user is complete.
    pub async fn ensure_complete(&self, user_id: &str) -> AppResult<()> {
        let missing = self.missing_categories(user_id).await?;
        if missing.is_empty() {
            Ok(())
        } else {
            tracing::debug!(user_id = %user_id, missing = ?missing, "User not eligible");
            Err(AppError::EligibilityIncomplete { missing })
        }
    }
}
