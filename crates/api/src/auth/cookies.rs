//! Session cookie delivery.
//!
//! Both tokens are set as HttpOnly cookies whose `Max-Age` matches the
//! lifetime of the token they carry. The access cookie is also the first
//! place the authentication gates look for a credential.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::service::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Attributes shared by both session cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    /// Emit the `Secure` attribute (production only).
    pub secure: bool,
    pub access_max_age: chrono::Duration,
    pub refresh_max_age: chrono::Duration,
}

fn session_cookie(
    name: &'static str,
    value: String,
    secure: bool,
    max_age: chrono::Duration,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Add both session cookies to `jar`.
pub fn with_session_cookies(jar: CookieJar, tokens: &TokenPair, settings: CookieSettings) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        settings.secure,
        settings.access_max_age,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        settings.secure,
        settings.refresh_max_age,
    ))
}

fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build(name)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}

/// Emit removal cookies for both session cookies.
///
/// Removal cookies are sent even when the request carried no cookies, since
/// the client may have authenticated with a bearer header.
pub fn without_session_cookies(jar: CookieJar, settings: CookieSettings) -> CookieJar {
    jar.add(removal_cookie(ACCESS_TOKEN_COOKIE, settings.secure))
        .add(removal_cookie(REFRESH_TOKEN_COOKIE, settings.secure))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secure: bool) -> CookieSettings {
        CookieSettings {
            secure,
            access_max_age: chrono::Duration::minutes(15),
            refresh_max_age: chrono::Duration::days(7),
        }
    }

    fn tokens() -> TokenPair {
        TokenPair {
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
        }
    }

    #[test]
    fn test_session_cookies_are_http_only_with_matching_max_age() {
        let jar = with_session_cookies(CookieJar::new(), &tokens(), settings(false));

        let access = jar.get(ACCESS_TOKEN_COOKIE).expect("access cookie set");
        assert_eq!(access.value(), "acc");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(false));
        assert_eq!(access.max_age(), Some(time::Duration::minutes(15)));

        let refresh = jar.get(REFRESH_TOKEN_COOKIE).expect("refresh cookie set");
        assert_eq!(refresh.value(), "ref");
        assert_eq!(refresh.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn test_secure_flag_follows_settings() {
        let jar = with_session_cookies(CookieJar::new(), &tokens(), settings(true));
        assert_eq!(jar.get(ACCESS_TOKEN_COOKIE).unwrap().secure(), Some(true));
        assert_eq!(jar.get(REFRESH_TOKEN_COOKIE).unwrap().secure(), Some(true));
    }

    #[test]
    fn test_removal_overwrites_both_cookies() {
        let jar = with_session_cookies(CookieJar::new(), &tokens(), settings(false));
        let jar = without_session_cookies(jar, settings(false));
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            let cookie = jar.get(name).expect("removal cookie present");
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        }
    }
}
