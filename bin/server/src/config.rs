//! Server configuration, loaded from the environment.
//!
//! Variables are prefixed `KEYGATE` and nested with `__`, so the Google
//! client secret is `KEYGATE__GOOGLE__CLIENT_SECRET` and the signing key is
//! `KEYGATE__AUTH__SECRET_KEY`.

use chrono::Duration;
use keygate_identity::{ProviderConfig, UserStatus};
use serde::Deserialize;

use crate::auth::flow::LogoutPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Postgres connection URL.
    pub database_url: String,
    /// Redis connection URL for the revocation ledger.
    pub redis_url: String,
    pub auth: AuthConfig,
    pub google: ProviderConfig,
    pub github: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret signing access and refresh tokens.
    pub secret_key: String,
    /// Access token lifetime in minutes.
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    /// Refresh token lifetime in hours.
    #[serde(default = "default_refresh_token_hours")]
    pub refresh_token_hours: i64,
    /// What logout does beyond revoking the token pair.
    #[serde(default)]
    pub logout_policy: LogoutPolicy,
    /// Status assigned to users provisioned at first login.
    #[serde(default = "default_new_user_status")]
    pub new_user_status: UserStatus,
    /// Whether the login state cookie is marked Secure.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_access_token_minutes() -> i64 {
    15
}

fn default_refresh_token_hours() -> i64 {
    168
}

fn default_new_user_status() -> UserStatus {
    UserStatus::Active
}

fn default_secure_cookies() -> bool {
    true
}

impl AuthConfig {
    /// Returns the access token lifetime.
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_minutes)
    }

    /// Returns the refresh token lifetime.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        Duration::hours(self.refresh_token_hours)
    }
}

impl ServerConfig {
    /// Loads configuration from `KEYGATE__*` environment variables.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("KEYGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
