//! Database entities.

#![allow(missing_docs)]

pub mod audience_category;
pub mod audience_option;
pub mod email_verification_code;
pub mod poll;
pub mod poll_option;
pub mod poll_target;
pub mod postal_mapping;
pub mod user;
pub mod user_membership;
pub mod vote;

pub use audience_category::Entity as AudienceCategory;
pub use audience_option::Entity as AudienceOption;
pub use email_verification_code::Entity as EmailVerificationCode;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use poll_target::Entity as PollTarget;
pub use postal_mapping::Entity as PostalMapping;
pub use user::Entity as User;
pub use user_membership::Entity as UserMembership;
pub use vote::Entity as Vote;
