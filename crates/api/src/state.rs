use std::sync::Arc;

use crate::auth::cookies::CookieSettings;
use crate::auth::service::AuthService;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Authentication service (hasher, token codecs, credential store).
    pub auth: Arc<AuthService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Cookie attributes for the session cookies issued by this server.
    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            secure: self.config.app_env.is_production(),
            access_max_age: self.auth.access_ttl(),
            refresh_max_age: self.auth.refresh_ttl(),
        }
    }
}
