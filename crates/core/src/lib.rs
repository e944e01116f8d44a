//! Shared primitives for the clipstream backend.
//!
//! - [`types`] -- primary key and timestamp aliases.
//! - [`error`] -- domain error taxonomy shared across crates.
//! - [`identity`] -- normalization rules for usernames and emails.

pub mod error;
pub mod identity;
pub mod types;
