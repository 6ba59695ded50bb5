//! Email verification codes.
//!
//! A code is six decimal digits, valid for a limited time and good for one
//! successful check. Emails that already belong to an account are refused
//! both when requesting and when checking a code.

use chrono::{Duration, Utc};
use kiezpoll_common::{AppError, AppResult, IdGenerator};
use kiezpoll_db::{
    entities::email_verification_code,
    repositories::{EmailVerificationRepository, UserRepository},
};
use rand::{
    Rng,
    distributions::{Distribution, Uniform},
};
use sea_orm::Set;
use serde::Serialize;
use validator::ValidateEmail;

use super::email::EmailService;

/// Number of digits in a code.
pub const CODE_LENGTH: usize = 6;

/// Draw a zero-padded numeric code.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let digit = Uniform::from(0..=9u8);
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + digit.sample(rng)))
        .collect()
}

/// Trim and lowercase an address, rejecting malformed ones.
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if email.validate_email() {
        Ok(email)
    } else {
        Err(AppError::Validation("Enter a valid email address".to_string()))
    }
}

/// Result of a code request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    /// Whether the mail transport accepted the message. The code is stored
    /// either way.
    pub dispatched: bool,
}

/// Verification service.
#[derive(Clone)]
pub struct VerificationService {
    code_repo: EmailVerificationRepository,
    user_repo: UserRepository,
    email: EmailService,
    ttl: Duration,
    id_gen: IdGenerator,
}

impl VerificationService {
    /// Create a new verification service.
    #[must_use]
    pub fn new(
        code_repo: EmailVerificationRepository,
        user_repo: UserRepository,
        email: EmailService,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            code_repo,
            user_repo,
            email,
            ttl: Duration::minutes(ttl_minutes),
            id_gen: IdGenerator::new(),
        }
    }

    async fn ensure_unregistered(&self, email: &str) -> AppResult<()> {
        if self.user_repo.email_exists(email).await? {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        Ok(())
    }

    /// Issue a code for `email` and mail it.
    pub async fn request_code(&self, email: &str) -> AppResult<CodeRequest> {
        let email = normalize_email(email)?;
        self.ensure_unregistered(&email).await?;

        let code = generate_code(&mut rand::thread_rng());
        let now = Utc::now();
        self.code_repo
            .create(email_verification_code::ActiveModel {
                id: Set(self.id_gen.generate()),
                email: Set(email.clone()),
                code: Set(code.clone()),
                created_at: Set(now.into()),
                expires_at: Set((now + self.ttl).into()),
                used: Set(false),
            })
            .await?;

        let dispatched = match self
            .email
            .send_verification_code(&email, &code, self.ttl.num_minutes())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Failed to send verification code");
                false
            }
        };

        Ok(CodeRequest { dispatched })
    }

    /// Consume a code. Returns `false` for wrong, used or expired codes.
    pub async fn check_code(&self, email: &str, code: &str) -> AppResult<bool> {
        let email = normalize_email(email)?;
        self.ensure_unregistered(&email).await?;

        let code = code.trim();
        if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let txn = self.code_repo.begin().await?;
        let verified = match EmailVerificationRepository::find_latest_valid_for_update(
            &txn,
            &email,
            code,
            Utc::now(),
        )
        .await?
        {
            Some(row) => EmailVerificationRepository::mark_used(&txn, &row.id).await?,
            None => false,
        };
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(email = %email, verified, "Verification code checked");
        Ok(verified)
    }
}
