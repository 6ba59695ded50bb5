//! Vote ledger.
//!
//! One vote row per (user, poll), re-pointed when the user changes their
//! mind. Option counters move only through atomic increment and decrement
//! statements issued in the same transaction as the vote row change.

use chrono::Utc;
use kiezpoll_common::{AppError, AppResult, IdGenerator};
use kiezpoll_db::{
    entities::{poll_option, vote},
    repositories::{PollOptionRepository, VoteRepository},
};
use sea_orm::{DatabaseTransaction, Set};
use serde::Serialize;

use super::eligibility::EligibilityService;
use super::poll::PollService;

/// What a cast did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum VoteOutcome {
    /// First vote on this poll.
    Created,
    /// The vote moved from `previous_option_id`.
    #[serde(rename_all = "camelCase")]
    Changed { previous_option_id: String },
    /// Re-submission of the current choice.
    Unchanged,
}

/// One line of a results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub option_id: String,
    pub text: String,
    pub votes: i32,
    pub percent: f64,
}

/// Results of a poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: String,
    pub question: String,
    pub total: i64,
    pub items: Vec<ResultItem>,
}

/// Per-option share of the total. A poll without votes reports 0% everywhere.
#[must_use]
pub fn tally(options: &[poll_option::Model]) -> (i64, Vec<ResultItem>) {
    let total: i64 = options.iter().map(|o| i64::from(o.votes.max(0))).sum();

    let items = options
        .iter()
        .map(|o| {
            let votes = o.votes.max(0);
            let percent = if total == 0 {
                0.0
            } else {
                f64::from(votes) / total as f64 * 100.0
            };
            ResultItem {
                option_id: o.id.clone(),
                text: o.text.clone(),
                votes,
                percent,
            }
        })
        .collect();

    (total, items)
}

/// Vote ledger service.
#[derive(Clone)]
pub struct VoteLedger {
    vote_repo: VoteRepository,
    polls: PollService,
    eligibility: EligibilityService,
    id_gen: IdGenerator,
}

impl VoteLedger {
    /// Create a new vote ledger.
    #[must_use]
    pub const fn new(
        vote_repo: VoteRepository,
        polls: PollService,
        eligibility: EligibilityService,
    ) -> Self {
        Self {
            vote_repo,
            polls,
            eligibility,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record `user_id`'s choice of `option_id` on `poll_id`.
    ///
    /// Checks, in order: the poll has options, the option belongs to the
    /// poll, the user is eligible. Repeating the current choice is a no-op.
    pub async fn cast_vote(
        &self,
        user_id: &str,
        poll_id: &str,
        option_id: &str,
    ) -> AppResult<VoteOutcome> {
        self.polls.get_poll(poll_id).await?;

        let options = self.polls.ensure_options(poll_id).await?;
        if options.is_empty() {
            return Err(AppError::Validation("Poll has no options".to_string()));
        }
        if !options.iter().any(|o| o.id == option_id) {
            return Err(AppError::Validation("Please select an option".to_string()));
        }

        self.eligibility.ensure_complete(user_id).await?;

        let txn = self.vote_repo.begin().await?;
        let outcome = self.apply(&txn, user_id, poll_id, option_id).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(user_id = %user_id, poll_id = %poll_id, option_id = %option_id, outcome = ?outcome, "Vote cast");
        Ok(outcome)
    }

    async fn apply(
        &self,
        txn: &DatabaseTransaction,
        user_id: &str,
        poll_id: &str,
        option_id: &str,
    ) -> AppResult<VoteOutcome> {
        let existing = match VoteRepository::find_for_update(txn, user_id, poll_id).await? {
            Some(existing) => existing,
            None => {
                let model = vote::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    user_id: Set(user_id.to_string()),
                    poll_id: Set(poll_id.to_string()),
                    option_id: Set(option_id.to_string()),
                    created_at: Set(Utc::now().into()),
                    updated_at: Set(None),
                };
                if VoteRepository::insert_if_absent(txn, model).await? {
                    PollOptionRepository::increment_votes(txn, option_id).await?;
                    return Ok(VoteOutcome::Created);
                }

                // A concurrent first vote by the same user won the insert;
                // continue from the row it committed.
                VoteRepository::find_for_update(txn, user_id, poll_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "Vote for user {user_id} on poll {poll_id} vanished after conflict"
                        ))
                    })?
            }
        };

        if existing.option_id == option_id {
            return Ok(VoteOutcome::Unchanged);
        }

        // Touch option rows in id order so concurrent changes cannot deadlock
        let previous = existing.option_id.clone();
        if previous.as_str() < option_id {
            PollOptionRepository::decrement_votes(txn, &previous).await?;
            PollOptionRepository::increment_votes(txn, option_id).await?;
        } else {
            PollOptionRepository::increment_votes(txn, option_id).await?;
            PollOptionRepository::decrement_votes(txn, &previous).await?;
        }
        VoteRepository::repoint(txn, &existing.id, option_id).await?;

        Ok(VoteOutcome::Changed {
            previous_option_id: previous,
        })
    }

    /// Results with percentages.
    pub async fn results(&self, poll_id: &str) -> AppResult<PollResults> {
        let poll = self.polls.get_poll(poll_id).await?;
        let options = self.polls.ensure_options(poll_id).await?;
        let (total, items) = tally(&options);

        Ok(PollResults {
            poll_id: poll.id,
            question: poll.question,
            total,
            items,
        })
    }

    /// The option the user currently votes for, if any.
    pub async fn user_vote(&self, user_id: &str, poll_id: &str) -> AppResult<Option<String>> {
        Ok(self
            .vote_repo
            .find_by_user_and_poll(user_id, poll_id)
            .await?
            .map(|v| v.option_id))
    }
}
