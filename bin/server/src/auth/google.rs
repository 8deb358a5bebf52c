//! Google identity provider adapter.
//!
//! Google issues a signed ID token with the code exchange, so this adapter
//! implements the full assertion verification step: JWKS lookup, strict
//! RS256, issuer and audience checks, and the `email_verified` requirement.
//! Profile fields (name, avatar) come from the userinfo endpoint; subject
//! and email come from the verified assertion.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use keygate_identity::{ProviderConfig, ProviderIdentity, ProviderKind};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    ExtraTokenFields, RedirectUrl, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};

use super::provider::{
    AssertedIdentity, IdentityProvider, LoginState, ProviderError, ProviderTokens,
};

/// Google OAuth authorization URL.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth token URL.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google userinfo endpoint.
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Google JWKS endpoint for ID token signature verification.
const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Both issuer forms Google uses in ID tokens.
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Default scopes when none are configured.
const DEFAULT_SCOPES: &str = "openid,email,profile";

/// Extra token-response field carrying the ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

/// Token response including Google's ID token.
type GoogleTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// OAuth2 client type carrying the extended token response.
type GoogleOAuthClient<
    HasAuthUrl = EndpointNotSet,
    HasDeviceAuthUrl = EndpointNotSet,
    HasIntrospectionUrl = EndpointNotSet,
    HasRevocationUrl = EndpointNotSet,
    HasTokenUrl = EndpointNotSet,
> = Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    HasAuthUrl,
    HasDeviceAuthUrl,
    HasIntrospectionUrl,
    HasRevocationUrl,
    HasTokenUrl,
>;

/// Identity provider adapter for Google.
pub struct GoogleProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    /// Creates a new Google adapter from injected configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        // Validate the redirect URL up front; the oauth2 client is rebuilt
        // per call and expects it to be well-formed.
        let _ = RedirectUrl::new(config.redirect_url().to_string())
            .map_err(|e| ProviderError::Configuration(format!("invalid redirect URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, http })
    }

    fn redirect_url(&self) -> RedirectUrl {
        RedirectUrl::new(self.config.redirect_url().to_string()).expect("validated at construction")
    }

    /// Verifies the signed ID token and extracts the trusted identity fields.
    async fn verify_id_token(&self, id_token: &str) -> Result<AssertedIdentity, ProviderError> {
        let header = decode_header(id_token).map_err(|e| {
            ProviderError::UntrustedIdentity(format!("unparseable ID token header: {}", e))
        })?;

        if header.alg != Algorithm::RS256 {
            return Err(ProviderError::UntrustedIdentity(format!(
                "unexpected ID token algorithm {:?}",
                header.alg
            )));
        }

        let kid = header.kid.ok_or_else(|| {
            ProviderError::UntrustedIdentity("ID token header has no key id".to_string())
        })?;

        let jwks = self.fetch_jwks().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| {
                ProviderError::UntrustedIdentity(format!("no signing key matches kid '{}'", kid))
            })?;

        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|e| {
            ProviderError::UntrustedIdentity(format!("invalid RSA key material: {}", e))
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.config.client_id()]);

        let token_data = decode::<GoogleIdClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| {
                ProviderError::UntrustedIdentity(format!("ID token validation failed: {}", e))
            })?;

        let claims = token_data.claims;
        if !claims.email_verified {
            return Err(ProviderError::UntrustedIdentity(
                "email not verified by provider".to_string(),
            ));
        }
        if claims.email.is_empty() {
            return Err(ProviderError::UntrustedIdentity(
                "email claim missing".to_string(),
            ));
        }

        Ok(AssertedIdentity {
            subject: claims.sub,
            email: claims.email,
        })
    }

    async fn fetch_jwks(&self) -> Result<JwksResponse, ProviderError> {
        let response = self.http.get(GOOGLE_CERTS_URL).send().await.map_err(|e| {
            ProviderError::UntrustedIdentity(format!("failed to fetch signing keys: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(ProviderError::UntrustedIdentity(format!(
                "signing key endpoint returned {}",
                response.status()
            )));
        }

        response.json().await.map_err(|e| {
            ProviderError::UntrustedIdentity(format!("malformed signing key set: {}", e))
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn authorization_url(&self) -> (String, LoginState) {
        let client = GoogleOAuthClient::new(ClientId::new(self.config.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.config.client_secret().to_string()))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string()).expect("valid auth URL"))
            .set_redirect_uri(self.redirect_url());

        let mut auth_request = client.authorize_url(CsrfToken::new_random);
        for scope in self.config.scopes(DEFAULT_SCOPES) {
            auth_request = auth_request.add_scope(Scope::new(scope));
        }
        auth_request = auth_request.add_extra_param("access_type", "offline");

        let (auth_url, csrf_token) = auth_request.url();

        (
            auth_url.to_string(),
            LoginState {
                csrf_token: csrf_token.secret().clone(),
            },
        )
    }

    async fn exchange(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let client = GoogleOAuthClient::new(ClientId::new(self.config.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.config.client_secret().to_string()))
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).expect("valid token URL"))
            .set_redirect_uri(self.redirect_url());

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::ExchangeFailed(format!("token exchange failed: {}", e)))?;

        Ok(ProviderTokens {
            access_token: token_response.access_token().secret().clone(),
            id_token: token_response.extra_fields().id_token.clone(),
        })
    }

    async fn verify_assertion(
        &self,
        tokens: &ProviderTokens,
    ) -> Result<Option<AssertedIdentity>, ProviderError> {
        let id_token = tokens.id_token.as_deref().ok_or_else(|| {
            ProviderError::UntrustedIdentity("no ID token in token response".to_string())
        })?;

        self.verify_id_token(id_token).await.map(Some)
    }

    async fn fetch_identity(
        &self,
        tokens: &ProviderTokens,
    ) -> Result<ProviderIdentity, ProviderError> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::IdentityFetchFailed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::IdentityFetchFailed(format!(
                "userinfo returned {}: {}",
                status, body
            )));
        }

        let info: GoogleUserInfo = response.json().await.map_err(|e| {
            ProviderError::IdentityFetchFailed(format!("malformed userinfo payload: {}", e))
        })?;

        Ok(ProviderIdentity {
            subject: info.id,
            email: info.email,
            email_verified: info.verified_email,
            display_name: info.name,
            avatar_url: info.picture,
        })
    }
}

/// Claims extracted from a verified Google ID token.
#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
}

/// Google userinfo payload.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

/// Google's JWKS document.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: String,
    n: String,
    e: String,
}
