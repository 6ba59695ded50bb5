//! User service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use kiezpoll_common::{AppError, AppResult, IdGenerator};
use kiezpoll_db::{
    entities::{audience_option, user},
    repositories::UserRepository,
};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::geo::normalize_postal_code;
use super::membership::MembershipService;
use super::verification::normalize_email;

/// Maximum username length.
const MAX_USERNAME_LEN: usize = 150;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    memberships: MembershipService,
    id_gen: IdGenerator,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 150))]
    pub username: String,

    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[serde(default)]
    pub postal_code: Option<String>,
}

/// A freshly registered user and the option assigned from their postal code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub user: user::Model,
    pub assigned_option: Option<audience_option::Model>,
}

fn validate_username(username: &str) -> AppResult<()> {
    let valid = !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Username may only contain letters, digits and . _ -".to_string(),
        ))
    }
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, memberships: MembershipService) -> Self {
        Self {
            user_repo,
            memberships,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new account.
    ///
    /// When a postal code is given, an audience membership is derived from
    /// it. A code that cannot be resolved does not fail the registration.
    pub async fn register(&self, input: RegisterInput) -> AppResult<Registration> {
        input.validate()?;
        let username = input.username.trim().to_string();
        validate_username(&username)?;
        let email = normalize_email(&input.email)?;

        if self.user_repo.find_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if self.user_repo.email_exists(&email).await? {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;
        let postal_code = input.postal_code.as_deref().and_then(normalize_postal_code);

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username_lower: Set(username.to_lowercase()),
            username: Set(username),
            email: Set(email),
            password_hash: Set(password_hash),
            token: Set(Some(self.id_gen.generate_token())),
            postal_code: Set(postal_code.clone()),
            is_admin: Set(false),
            created_at: Set(Utc::now().into()),
        };
        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        let assigned_option = match postal_code {
            Some(code) => self.memberships.assign_from_postal(&user.id, &code).await,
            None => None,
        };

        Ok(Registration {
            user,
            assigned_option,
        })
    }

    /// Check a username and password.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(username.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Resolve a bearer token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user by ID.
    pub async fn get(&self, user_id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(user_id).await
    }

    /// Store a new postal code and re-derive the membership from it.
    pub async fn update_postal_code(
        &self,
        user_id: &str,
        raw: &str,
    ) -> AppResult<Option<audience_option::Model>> {
        let code = normalize_postal_code(raw)
            .ok_or_else(|| AppError::Validation("Enter a valid postal code".to_string()))?;

        let user = self.user_repo.get_by_id(user_id).await?;
        if user.postal_code.as_deref() != Some(code.as_str()) {
            let mut active = user.into_active_model();
            active.postal_code = Set(Some(code.clone()));
            self.user_repo.update(active).await?;
        }

        Ok(self.memberships.assign_from_postal(user_id, &code).await)
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
