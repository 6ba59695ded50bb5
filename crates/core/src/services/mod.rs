//! Business logic services.

#![allow(missing_docs)]

pub mod audience;
pub mod eligibility;
pub mod email;
pub mod geo;
pub mod membership;
pub mod poll;
pub mod postal_import;
pub mod user;
pub mod verification;
pub mod visibility;
pub mod vote;

pub use audience::{AudienceService, CategoryWithOptions};
pub use eligibility::EligibilityService;
pub use email::{EmailMessage, EmailService, LogMailer, Mailer};
pub use geo::{
    DistrictTableResolver, GeoLookupService, GeoMatch, NationalDatasetResolver, PostalResolver,
    ResolvedOption,
};
pub use membership::{MembershipService, MembershipView};
pub use poll::{CreatePollInput, PollService, PollWithOptions};
pub use postal_import::{ImportSummary, PostalImportService};
pub use user::{RegisterInput, Registration, UserService};
pub use verification::{CodeRequest, VerificationService};
pub use visibility::{TargetedPoll, Viewer, VisibilityService};
pub use vote::{PollResults, ResultItem, VoteLedger, VoteOutcome};
