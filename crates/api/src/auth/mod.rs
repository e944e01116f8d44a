//! Authentication and session lifecycle.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- purpose-bound token codec for access and refresh tokens.
//! - [`service`] -- login, refresh rotation, logout, and access-token resolution.
//! - [`cookies`] -- session cookie delivery and removal.
//! - [`error`] -- hashing, verification, and auth error taxonomy.

pub mod cookies;
pub mod error;
pub mod jwt;
pub mod password;
pub mod service;
