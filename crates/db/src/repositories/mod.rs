//! Repository layer for database operations.

pub mod audience;
pub mod email_verification;
pub mod membership;
pub mod poll;
pub mod poll_option;
pub mod postal_mapping;
pub mod user;
pub mod vote;

pub use audience::AudienceRepository;
pub use email_verification::EmailVerificationRepository;
pub use membership::MembershipRepository;
pub use poll::PollRepository;
pub use poll_option::PollOptionRepository;
pub use postal_mapping::{PostalMappingRepository, UpsertOutcome};
pub use user::UserRepository;
pub use vote::VoteRepository;
