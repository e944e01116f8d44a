use chrono::Duration;

use crate::auth::jwt::JwtConfig;
use crate::auth::password::HasherConfig;
use crate::auth::service::DEFAULT_PASSWORD_MIN_LENGTH;

/// Startup configuration failure. The process must not start with any of these.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Deployment environment. Controls the `Secure` attribute on session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }
}

/// Server configuration loaded from environment variables.
///
/// Token secrets and lifetimes are required; everything else has a default
/// suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub app_env: AppEnv,
    /// Token secrets and lifetimes.
    pub jwt: JwtConfig,
    /// Argon2 cost parameters.
    pub hasher: HasherConfig,
    pub password_min_length: usize,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                     | Required | Default                 |
    /// |-----------------------------|----------|-------------------------|
    /// | `ACCESS_TOKEN_SECRET`       | **yes**  | --                      |
    /// | `ACCESS_TOKEN_EXPIRY_MINS`  | **yes**  | --                      |
    /// | `REFRESH_TOKEN_SECRET`      | **yes**  | --                      |
    /// | `REFRESH_TOKEN_EXPIRY_DAYS` | **yes**  | --                      |
    /// | `HOST`                      | no       | `0.0.0.0`               |
    /// | `PORT`                      | no       | `3000`                  |
    /// | `CORS_ORIGINS`              | no       | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | no       | `30`                    |
    /// | `APP_ENV`                   | no       | `development`           |
    /// | `PASSWORD_MIN_LENGTH`       | no       | `8`                     |
    /// | `ARGON2_MEMORY_KIB`         | no       | `19456`                 |
    /// | `ARGON2_ITERATIONS`         | no       | `2`                     |
    /// | `ARGON2_PARALLELISM`        | no       | `1`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let access_secret = env.required("ACCESS_TOKEN_SECRET")?;
        let access_ttl =
            env.required_duration("ACCESS_TOKEN_EXPIRY_MINS", Duration::try_minutes)?;
        let refresh_secret = env.required("REFRESH_TOKEN_SECRET")?;
        let refresh_ttl =
            env.required_duration("REFRESH_TOKEN_EXPIRY_DAYS", Duration::try_days)?;
        if access_secret == refresh_secret {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_SECRET",
                reason: "must differ from ACCESS_TOKEN_SECRET".into(),
            });
        }

        let defaults = HasherConfig::default();
        let hasher = HasherConfig {
            memory_kib: env.parsed_or("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env.parsed_or("ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: env.parsed_or("ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let app_env = match env.get("APP_ENV").as_deref().map(str::trim) {
            None | Some("") | Some("development") | Some("dev") | Some("test") => {
                AppEnv::Development
            }
            Some("production") | Some("prod") => AppEnv::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    reason: format!("unknown environment '{other}'"),
                })
            }
        };

        let cors_origins: Vec<String> = env
            .get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: env.get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: env.parsed_or("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env.parsed_or("REQUEST_TIMEOUT_SECS", 30)?,
            app_env,
            jwt: JwtConfig {
                access_secret,
                access_ttl,
                refresh_secret,
                refresh_ttl,
            },
            hasher,
            password_min_length: env
                .parsed_or("PASSWORD_MIN_LENGTH", DEFAULT_PASSWORD_MIN_LENGTH)?,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        let value = self.get(key).ok_or(ConfigError::Missing(key))?;
        if value.trim().is_empty() {
            return Err(ConfigError::Empty(key));
        }
        Ok(value)
    }

    fn required_positive(&self, key: &'static str) -> Result<i64, ConfigError> {
        let raw = self.required(key)?;
        match raw.trim().parse::<i64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::Invalid {
                name: key,
                reason: format!("expected a positive integer, got '{raw}'"),
            }),
        }
    }

    /// A positive count of `unit`s that must fit in a [`Duration`].
    fn required_duration(
        &self,
        key: &'static str,
        unit: fn(i64) -> Option<Duration>,
    ) -> Result<Duration, ConfigError> {
        let n = self.required_positive(key)?;
        unit(n).ok_or_else(|| ConfigError::Invalid {
            name: key,
            reason: format!("{n} is out of range"),
        })
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: key,
                reason: e.to_string(),
            }),
        }
    }
}
