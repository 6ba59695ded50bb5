//! Core business logic for kiezpoll: audience assignment, eligibility and
//! the vote ledger.

pub mod csv_table;
pub mod services;

pub use services::*;
