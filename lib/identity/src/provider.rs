//! Identity provider value types.
//!
//! These types cross the boundary between the provider adapters in the
//! server and the rest of the domain: which provider authenticated a user,
//! what profile the provider reported, and how each adapter is configured.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The identity providers keygate can authenticate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Github,
}

impl ProviderKind {
    /// Returns the provider name as its storage/wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a provider name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProviderError {
    /// The value that failed to parse.
    pub value: String,
}

impl fmt::Display for ParseProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown identity provider '{}'", self.value)
    }
}

impl std::error::Error for ParseProviderError {}

impl FromStr for ProviderKind {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(ParseProviderError {
                value: other.to_string(),
            }),
        }
    }
}

/// Profile a provider reported for an authenticated user.
///
/// Produced by a provider adapter after the userinfo fetch (and, where the
/// provider signs an identity assertion, after that assertion verified).
/// `email_verified` reflects the provider's own attestation; the login flow
/// refuses identities where it is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// The provider's stable identifier for the user.
    pub subject: String,
    /// Email address reported by the provider.
    pub email: String,
    /// Whether the provider attests the email is verified.
    pub email_verified: bool,
    /// Display name, if reported.
    pub display_name: Option<String>,
    /// Avatar URL, if reported.
    pub avatar_url: Option<String>,
}

/// OAuth2 client configuration for one identity provider.
///
/// Injected into each adapter at construction; there is no process-wide
/// provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// The redirect URL for the OAuth2 callback.
    redirect_url: String,
    /// Scopes to request as a comma-separated string. Each adapter supplies
    /// its own default when unset.
    #[serde(default)]
    scopes: Option<String>,
}

impl ProviderConfig {
    /// Creates a new provider configuration.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
            scopes: None,
        }
    }

    /// Overrides the default scopes with a comma-separated list.
    #[must_use]
    pub fn with_scopes(mut self, scopes: String) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 redirect URL.
    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// Returns the configured scopes, falling back to the adapter default.
    #[must_use]
    pub fn scopes(&self, default: &str) -> Vec<String> {
        self.scopes
            .as_deref()
            .unwrap_or(default)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
