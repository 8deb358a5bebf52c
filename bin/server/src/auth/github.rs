//! GitHub identity provider adapter.
//!
//! GitHub issues no signed identity assertion, so `verify_assertion` always
//! answers `Ok(None)` and the userinfo path is authoritative. GitHub's /user
//! payload omits the email unless it is public, so the adapter also calls
//! /user/emails and selects the primary verified address.

use async_trait::async_trait;
use keygate_identity::{ProviderConfig, ProviderIdentity, ProviderKind};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;

use super::provider::{
    AssertedIdentity, IdentityProvider, LoginState, ProviderError, ProviderTokens,
};

/// GitHub OAuth authorization URL.
const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";

/// GitHub OAuth token URL.
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// GitHub authenticated-user endpoint.
const GITHUB_USER_URL: &str = "https://api.github.com/user";

/// GitHub email listing endpoint.
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

/// Default scopes when none are configured.
const DEFAULT_SCOPES: &str = "user:email";

/// Identity provider adapter for GitHub.
pub struct GithubProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl GithubProvider {
    /// Creates a new GitHub adapter from injected configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let _ = RedirectUrl::new(config.redirect_url().to_string())
            .map_err(|e| ProviderError::Configuration(format!("invalid redirect URL: {}", e)))?;

        // GitHub's API rejects requests without a User-Agent.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("keygate")
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, http })
    }

    fn redirect_url(&self) -> RedirectUrl {
        RedirectUrl::new(self.config.redirect_url().to_string()).expect("validated at construction")
    }

    /// Picks the primary verified email, falling back to any verified one.
    fn select_email(emails: &[GithubEmail]) -> Option<String> {
        emails
            .iter()
            .find(|e| e.primary && e.verified)
            .or_else(|| emails.iter().find(|e| e.verified))
            .map(|e| e.email.clone())
    }
}

#[async_trait]
impl IdentityProvider for GithubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Github
    }

    fn authorization_url(&self) -> (String, LoginState) {
        let client = BasicClient::new(ClientId::new(self.config.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.config.client_secret().to_string()))
            .set_auth_uri(AuthUrl::new(GITHUB_AUTH_URL.to_string()).expect("valid auth URL"))
            .set_redirect_uri(self.redirect_url());

        let mut auth_request = client.authorize_url(CsrfToken::new_random);
        for scope in self.config.scopes(DEFAULT_SCOPES) {
            auth_request = auth_request.add_scope(Scope::new(scope));
        }

        let (auth_url, csrf_token) = auth_request.url();

        (
            auth_url.to_string(),
            LoginState {
                csrf_token: csrf_token.secret().clone(),
            },
        )
    }

    async fn exchange(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let client = BasicClient::new(ClientId::new(self.config.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.config.client_secret().to_string()))
            .set_token_uri(TokenUrl::new(GITHUB_TOKEN_URL.to_string()).expect("valid token URL"))
            .set_redirect_uri(self.redirect_url());

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::ExchangeFailed(format!("token exchange failed: {}", e)))?;

        Ok(ProviderTokens {
            access_token: token_response.access_token().secret().clone(),
            id_token: None,
        })
    }

    async fn verify_assertion(
        &self,
        _tokens: &ProviderTokens,
    ) -> Result<Option<AssertedIdentity>, ProviderError> {
        // GitHub does not issue a signed identity assertion.
        Ok(None)
    }

    async fn fetch_identity(
        &self,
        tokens: &ProviderTokens,
    ) -> Result<ProviderIdentity, ProviderError> {
        let response = self
            .http
            .get(GITHUB_USER_URL)
            .bearer_auth(&tokens.access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::IdentityFetchFailed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::IdentityFetchFailed(format!(
                "user endpoint returned {}: {}",
                status, body
            )));
        }

        let user: GithubUser = response.json().await.map_err(|e| {
            ProviderError::IdentityFetchFailed(format!("malformed user payload: {}", e))
        })?;

        let response = self
            .http
            .get(GITHUB_EMAILS_URL)
            .bearer_auth(&tokens.access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::IdentityFetchFailed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::IdentityFetchFailed(format!(
                "emails endpoint returned {}: {}",
                status, body
            )));
        }

        let emails: Vec<GithubEmail> = response.json().await.map_err(|e| {
            ProviderError::IdentityFetchFailed(format!("malformed emails payload: {}", e))
        })?;

        let email = Self::select_email(&emails).ok_or_else(|| {
            ProviderError::IdentityFetchFailed("no verified email on account".to_string())
        })?;

        Ok(ProviderIdentity {
            subject: user.id.to_string(),
            email,
            email_verified: true,
            display_name: user.name.or(Some(user.login)),
            avatar_url: user.avatar_url,
        })
    }
}

/// GitHub /user payload.
#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
}

/// One entry of the GitHub /user/emails payload.
#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}
