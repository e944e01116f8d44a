//! Request-processing authentication gates.
//!
//! - [`auth::AuthUser`] -- requires a valid access token; rejects otherwise.
//! - [`auth::MaybeAuthUser`] -- attaches an identity when one is present; never rejects.

pub mod auth;
