//! Identity provider capability interface.
//!
//! One adapter per provider implements this trait; the login flow only ever
//! talks to the trait. Adapters mutate no local state, they just make
//! outbound calls.

use async_trait::async_trait;
use keygate_identity::{ProviderIdentity, ProviderKind};
use std::fmt;

/// Anti-CSRF state minted alongside an authorization URL.
///
/// Round-tripped through a short-lived cookie and compared against the
/// `state` query parameter on callback.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// Random CSRF token embedded in the authorization URL.
    pub csrf_token: String,
}

/// Provider-issued tokens from a code exchange.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    /// The provider access token used for the userinfo fetch.
    pub access_token: String,
    /// The raw signed ID token, for providers that issue one.
    pub id_token: Option<String>,
}

/// Identity fields recovered from a verified signed assertion.
///
/// When present, these override the corresponding userinfo profile fields;
/// the assertion is the authoritative source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertedIdentity {
    /// Subject from the verified assertion.
    pub subject: String,
    /// Verified email from the assertion.
    pub email: String,
}

/// Capability interface for one identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Builds the provider redirect URL with a fresh anti-CSRF state.
    fn authorization_url(&self) -> (String, LoginState);

    /// Trades a one-time authorization code for provider tokens.
    async fn exchange(&self, code: &str) -> Result<ProviderTokens, ProviderError>;

    /// Validates the provider's signed identity assertion, if it issues one.
    ///
    /// Returns `Ok(None)` for providers without signed assertions. A
    /// provider that issues assertions must never answer `Ok(None)` for a
    /// missing or invalid one; that is `ProviderError::UntrustedIdentity`.
    async fn verify_assertion(
        &self,
        tokens: &ProviderTokens,
    ) -> Result<Option<AssertedIdentity>, ProviderError>;

    /// Retrieves the user's profile with the provider access token.
    async fn fetch_identity(
        &self,
        tokens: &ProviderTokens,
    ) -> Result<ProviderIdentity, ProviderError>;
}

/// Errors from identity provider adapters.
#[derive(Debug)]
pub enum ProviderError {
    /// Adapter configuration is invalid (bad URLs, missing client id).
    Configuration(String),
    /// The provider rejected the code exchange, or it failed in transport.
    ExchangeFailed(String),
    /// The userinfo fetch returned non-2xx or a malformed payload.
    IdentityFetchFailed(String),
    /// The signed identity assertion failed validation.
    UntrustedIdentity(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "provider configuration error: {}", msg),
            Self::ExchangeFailed(msg) => write!(f, "code exchange failed: {}", msg),
            Self::IdentityFetchFailed(msg) => write!(f, "identity fetch failed: {}", msg),
            Self::UntrustedIdentity(msg) => write!(f, "untrusted identity: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}
