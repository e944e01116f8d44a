//! Shared helpers for HTTP integration tests.
//!
//! Tests drive the real router (same middleware stack as production) backed by
//! an [`InMemoryCredentialStore`], so no database is needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Duration;
use http_body_util::BodyExt;
use tower::ServiceExt;

use clipstream_api::auth::jwt::JwtConfig;
use clipstream_api::auth::password::{HasherConfig, PasswordHasher};
use clipstream_api::auth::service::{AuthService, NewAccount, DEFAULT_PASSWORD_MIN_LENGTH};
use clipstream_api::config::{AppEnv, ServerConfig};
use clipstream_api::router::build_app_router;
use clipstream_api::state::AppState;
use clipstream_db::store::InMemoryCredentialStore;

pub const TEST_PASSWORD: &str = "test_password_123!";

/// Build a test `ServerConfig` with safe defaults and the given access ttl.
pub fn test_config(access_ttl: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        app_env: AppEnv::Development,
        jwt: JwtConfig {
            access_secret: "integration-access-secret".to_string(),
            access_ttl,
            refresh_secret: "integration-refresh-secret".to_string(),
            refresh_ttl: Duration::days(10),
        },
        // Minimal Argon2 cost keeps the suite fast.
        hasher: HasherConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        },
        password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
    }
}

/// A router plus direct handles on the pieces behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryCredentialStore>,
}

impl TestApp {
    /// Fresh router per request (`oneshot` consumes it).
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

pub fn build_test_app_with_ttl(access_ttl: Duration) -> TestApp {
    let config = test_config(access_ttl);
    let store = Arc::new(InMemoryCredentialStore::new());
    let hasher = PasswordHasher::new(config.hasher).expect("test params are valid");
    let auth = AuthService::new(
        store.clone(),
        hasher,
        &config.jwt,
        config.password_min_length,
    );
    let state = AppState {
        auth: Arc::new(auth),
        config: Arc::new(config),
    };
    TestApp {
        router: build_app_router(state.clone()),
        state,
        store,
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_ttl(Duration::minutes(15))
}

/// Register a user directly through the service and return its id.
pub async fn create_test_user(app: &TestApp, username: &str) -> i64 {
    app.state
        .auth
        .register(NewAccount {
            username: username.to_string(),
            email: format!("{username}@test.com"),
            full_name: format!("{username} Tester"),
            avatar_url: None,
            password: TEST_PASSWORD.to_string(),
        })
        .await
        .expect("user creation should succeed")
        .id
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_with_cookie(app: Router, uri: &str, cookie: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_with_cookie(app: Router, uri: &str, cookie: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// All `Set-Cookie` header values on a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect()
}

/// The `Set-Cookie` value for cookie `name`, if present.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
}

/// Log in via the API and return the JSON body.
pub async fn login(app: Router, identifier: &str, password: &str) -> serde_json::Value {
    let body = serde_json::json!({ "identifier": identifier, "password": password });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    body_json(response).await
}
