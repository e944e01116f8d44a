//! Canonical forms for login identifiers.
//!
//! Usernames and emails are stored trimmed and lowercased so that lookups are
//! case-insensitive without relying on collation settings in the database.

/// Normalize a username or email for storage and lookup.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Returns `true` when `raw` looks like an email address rather than a username.
///
/// Registration uses this to reject usernames containing `@`, which keeps a
/// username from ever colliding with an email in the combined login lookup.
pub fn is_email_like(raw: &str) -> bool {
    raw.contains('@')
}
