//! Poll visibility.
//!
//! Only polls with the visibility flag set are ever listed. Among those:
//! anonymous callers see untargeted polls, users whose profile is still
//! incomplete see everything (voting stays gated), and complete users see
//! untargeted polls plus those targeting one of their options.

use std::collections::{HashMap, HashSet};

use kiezpoll_common::AppResult;
use kiezpoll_db::{
    entities::poll,
    repositories::{MembershipRepository, PollRepository},
};

use super::eligibility::EligibilityService;

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Incomplete,
    Complete { option_ids: HashSet<String> },
}

/// A poll together with its target option ids.
#[derive(Debug, Clone)]
pub struct TargetedPoll {
    pub poll: poll::Model,
    pub target_option_ids: Vec<String>,
}

impl TargetedPoll {
    /// Whether `viewer` may see this poll.
    #[must_use]
    pub fn is_visible_to(&self, viewer: &Viewer) -> bool {
        if !self.poll.is_visible {
            return false;
        }

        match viewer {
            Viewer::Anonymous => self.target_option_ids.is_empty(),
            Viewer::Incomplete => true,
            Viewer::Complete { option_ids } => {
                self.target_option_ids.is_empty()
                    || self
                        .target_option_ids
                        .iter()
                        .any(|id| option_ids.contains(id))
            }
        }
    }
}

/// Keep the polls `viewer` may see, preserving order.
#[must_use]
pub fn filter_visible(polls: Vec<TargetedPoll>, viewer: &Viewer) -> Vec<TargetedPoll> {
    polls
        .into_iter()
        .filter(|p| p.is_visible_to(viewer))
        .collect()
}

/// Visibility service.
#[derive(Clone)]
pub struct VisibilityService {
    poll_repo: PollRepository,
    membership_repo: MembershipRepository,
    eligibility: EligibilityService,
}

impl VisibilityService {
    /// Create a new visibility service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        membership_repo: MembershipRepository,
        eligibility: EligibilityService,
    ) -> Self {
        Self {
            poll_repo,
            membership_repo,
            eligibility,
        }
    }

    /// Classify the caller.
    pub async fn viewer(&self, user_id: Option<&str>) -> AppResult<Viewer> {
        let Some(user_id) = user_id else {
            return Ok(Viewer::Anonymous);
        };

        if !self.eligibility.is_complete(user_id).await? {
            return Ok(Viewer::Incomplete);
        }

        let option_ids = self
            .membership_repo
            .find_by_user(user_id)
            .await?
            .into_iter()
            .map(|m| m.option_id)
            .collect();
        Ok(Viewer::Complete { option_ids })
    }

    /// Visible polls for a user, or for an anonymous caller when `None`.
    pub async fn visible_polls(&self, user_id: Option<&str>) -> AppResult<Vec<TargetedPoll>> {
        let polls = self.poll_repo.find_visible().await?;
        if polls.is_empty() {
            return Ok(vec![]);
        }

        let poll_ids: Vec<String> = polls.iter().map(|p| p.id.clone()).collect();
        let mut targets: HashMap<String, Vec<String>> = HashMap::new();
        for target in self.poll_repo.find_targets(&poll_ids).await? {
            targets.entry(target.poll_id).or_default().push(target.option_id);
        }

        let targeted = polls
            .into_iter()
            .map(|poll| TargetedPoll {
                target_option_ids: targets.remove(&poll.id).unwrap_or_default(),
                poll,
            })
            .collect();

        let viewer = self.viewer(user_id).await?;
        Ok(filter_visible(targeted, &viewer))
    }
}
