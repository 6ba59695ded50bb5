//! Poll service.

use std::collections::BTreeSet;

use chrono::Utc;
use kiezpoll_common::{AppError, AppResult, IdGenerator};
use kiezpoll_db::{
    entities::{poll, poll_option, poll_target},
    repositories::{AudienceRepository, PollOptionRepository, PollRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum length of an option text.
const MAX_OPTION_TEXT_LEN: usize = 200;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    audience_repo: AudienceRepository,
    id_gen: IdGenerator,
}

/// Input for creating a poll.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,

    #[validate(length(min = 1, max = 10))]
    pub options: Vec<String>,

    #[serde(default)]
    pub target_option_ids: Vec<String>,

    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

const fn default_visible() -> bool {
    true
}

/// A poll with its options in display order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollWithOptions {
    pub poll: poll::Model,
    pub options: Vec<poll_option::Model>,
}

fn insertable(option: &poll_option::Model) -> poll_option::ActiveModel {
    poll_option::ActiveModel {
        id: Set(option.id.clone()),
        poll_id: Set(option.poll_id.clone()),
        text: Set(option.text.clone()),
        votes: Set(option.votes),
        display_order: Set(option.display_order),
    }
}

/// Trim option texts and reject empty or overlong ones.
fn clean_option_texts(options: &[String]) -> AppResult<Vec<String>> {
    options
        .iter()
        .map(|text| {
            let text = text.trim();
            if text.is_empty() {
                return Err(AppError::Validation(
                    "Poll options cannot be empty".to_string(),
                ));
            }
            if text.chars().count() > MAX_OPTION_TEXT_LEN {
                return Err(AppError::Validation(format!(
                    "Poll option is too long (max {MAX_OPTION_TEXT_LEN} chars)"
                )));
            }
            Ok(text.to_string())
        })
        .collect()
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        audience_repo: AudienceRepository,
    ) -> Self {
        Self {
            poll_repo,
            option_repo,
            audience_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a poll by ID.
    pub async fn get_poll(&self, poll_id: &str) -> AppResult<poll::Model> {
        self.poll_repo.get_by_id(poll_id).await
    }

    /// Create a poll with its options and targets in one transaction.
    pub async fn create_poll(&self, input: CreatePollInput) -> AppResult<PollWithOptions> {
        input.validate()?;
        let question = input.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }
        let texts = clean_option_texts(&input.options)?;
        let target_ids = self.checked_targets(&input.target_option_ids).await?;

        let poll_id = self.id_gen.generate();
        let txn = self.poll_repo.begin().await?;

        let poll = PollRepository::insert(
            &txn,
            poll::ActiveModel {
                id: Set(poll_id.clone()),
                question: Set(question.to_string()),
                is_visible: Set(input.is_visible),
                option_one: Set(None),
                option_two: Set(None),
                option_three: Set(None),
                option_one_count: Set(0),
                option_two_count: Set(0),
                option_three_count: Set(0),
                created_at: Set(Utc::now().into()),
            },
        )
        .await?;

        let options: Vec<poll_option::Model> = texts
            .into_iter()
            .enumerate()
            .map(|(order, text)| poll_option::Model {
                id: self.id_gen.generate(),
                poll_id: poll_id.clone(),
                text,
                votes: 0,
                display_order: order as i32,
            })
            .collect();
        PollOptionRepository::insert_many(
            &txn,
            options.iter().map(insertable).collect(),
        )
        .await?;
        PollRepository::insert_targets(&txn, self.target_models(&poll_id, &target_ids)).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(poll_id = %poll.id, options = options.len(), targets = target_ids.len(), "Poll created");
        Ok(PollWithOptions { poll, options })
    }

    /// Show or hide a poll.
    pub async fn set_visibility(&self, poll_id: &str, is_visible: bool) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        if poll.is_visible == is_visible {
            return Ok(poll);
        }

        let mut active = poll.into_active_model();
        active.is_visible = Set(is_visible);
        self.poll_repo.update(active).await
    }

    /// Replace a poll's target set. An empty set opens the poll to everyone.
    pub async fn set_targets(&self, poll_id: &str, option_ids: &[String]) -> AppResult<Vec<String>> {
        self.poll_repo.get_by_id(poll_id).await?;
        let target_ids = self.checked_targets(option_ids).await?;

        let txn = self.poll_repo.begin().await?;
        PollRepository::delete_targets(&txn, poll_id).await?;
        PollRepository::insert_targets(&txn, self.target_models(poll_id, &target_ids)).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(target_ids)
    }

    /// Target option ids of a poll.
    pub async fn get_targets(&self, poll_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .poll_repo
            .find_targets(&[poll_id.to_string()])
            .await?
            .into_iter()
            .map(|t| t.option_id)
            .collect())
    }

    /// Options of a poll, creating them from the legacy inline slots the first
    /// time a poll without option rows is accessed.
    ///
    /// Order and counters of the legacy slots carry over; empty slots are
    /// skipped. A poll that already has options is left alone.
    pub async fn ensure_options(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        let existing = self.option_repo.find_by_poll(poll_id).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let txn = self.poll_repo.begin().await?;
        let poll = PollRepository::find_for_update(&txn, poll_id)
            .await?
            .ok_or_else(|| AppError::PollNotFound(poll_id.to_string()))?;

        // Another request may have backfilled while we waited for the lock
        let existing = PollOptionRepository::find_by_poll_in(&txn, poll_id).await?;
        if !existing.is_empty() {
            txn.commit()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(existing);
        }

        let options: Vec<poll_option::Model> = poll
            .legacy_choices()
            .into_iter()
            .enumerate()
            .map(|(order, (text, votes))| poll_option::Model {
                id: self.id_gen.generate(),
                poll_id: poll_id.to_string(),
                text,
                votes,
                display_order: order as i32,
            })
            .collect();
        PollOptionRepository::insert_many(
            &txn,
            options.iter().map(insertable).collect(),
        )
        .await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !options.is_empty() {
            tracing::info!(poll_id = %poll_id, options = options.len(), "Backfilled poll options from legacy fields");
        }
        Ok(options)
    }

    async fn checked_targets(&self, option_ids: &[String]) -> AppResult<Vec<String>> {
        let wanted: BTreeSet<String> = option_ids.iter().cloned().collect();
        if wanted.is_empty() {
            return Ok(vec![]);
        }

        let wanted: Vec<String> = wanted.into_iter().collect();
        let found = self.audience_repo.find_options_by_ids(&wanted).await?;
        if found.len() != wanted.len() {
            return Err(AppError::Validation(
                "Target references an unknown audience option".to_string(),
            ));
        }
        Ok(wanted)
    }

    fn target_models(&self, poll_id: &str, option_ids: &[String]) -> Vec<poll_target::ActiveModel> {
        option_ids
            .iter()
            .map(|option_id| poll_target::ActiveModel {
                id: Set(self.id_gen.generate()),
                poll_id: Set(poll_id.to_string()),
                option_id: Set(option_id.clone()),
            })
            .collect()
    }
}
