//! Request admission.
//!
//! `AccessGate` runs the full check sequence for one request: bearer token
//! present, signature and expiry valid, pair not revoked, user known and
//! active. `RequireAuth` is the extractor handlers use to demand it.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use keygate_identity::User;
use std::fmt;
use std::sync::Arc;

use super::AppState;
use super::directory::UserDirectory;
use super::revocation::RevocationLedger;
use super::token::{TokenError, TokenService};
use crate::error::ApiError;

/// Admission checks for authenticated requests.
pub struct AccessGate {
    tokens: TokenService,
    ledger: Arc<dyn RevocationLedger>,
    directory: Arc<dyn UserDirectory>,
}

impl AccessGate {
    #[must_use]
    pub fn new(
        tokens: TokenService,
        ledger: Arc<dyn RevocationLedger>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            tokens,
            ledger,
            directory,
        }
    }

    /// Admits or refuses the bearer of the given Authorization header.
    ///
    /// Checks run cheapest-first; the directory is only consulted for
    /// tokens that are well-formed, unexpired, and unrevoked.
    pub async fn check(&self, authorization: Option<&str>) -> Result<User, GateError> {
        let header = authorization.ok_or(GateError::MissingAuthHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(GateError::AuthHeaderMalformed)?;
        if token.is_empty() {
            return Err(GateError::AuthHeaderMalformed);
        }

        let claims = self.tokens.verify(token).map_err(|e| match e {
            TokenError::Expired => GateError::TokenExpired,
            other => GateError::TokenInvalid(other),
        })?;

        let denied = self
            .ledger
            .is_denied(claims.jti)
            .await
            .map_err(|e| GateError::Internal(e.to_string()))?;
        if denied {
            return Err(GateError::TokenRevoked);
        }

        let user = self
            .directory
            .find_by_id(claims.sub)
            .await
            .map_err(|e| GateError::Internal(e.to_string()))?
            .ok_or(GateError::UserNotFound)?;

        if !user.is_active() {
            return Err(GateError::AccountSuspended);
        }

        Ok(user)
    }
}

/// Extractor demanding an admitted user.
pub struct RequireAuth(pub User);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let user = state.gate.check(authorization).await?;
        Ok(Self(user))
    }
}

/// Reasons the gate refuses a request.
#[derive(Debug)]
pub enum GateError {
    /// No Authorization header on the request.
    MissingAuthHeader,
    /// The header is not a non-empty bearer token.
    AuthHeaderMalformed,
    /// The token failed signature or structural checks.
    TokenInvalid(TokenError),
    /// The token's expiry has passed.
    TokenExpired,
    /// The token pair has been revoked.
    TokenRevoked,
    /// The token's subject no longer exists.
    UserNotFound,
    /// The user exists but is not active.
    AccountSuspended,
    /// A backing store failed while checking.
    Internal(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAuthHeader => write!(f, "missing authorization header"),
            Self::AuthHeaderMalformed => write!(f, "malformed authorization header"),
            Self::TokenInvalid(e) => write!(f, "invalid token: {}", e),
            Self::TokenExpired => write!(f, "token expired"),
            Self::TokenRevoked => write!(f, "token revoked"),
            Self::UserNotFound => write!(f, "user not found"),
            Self::AccountSuspended => write!(f, "account suspended"),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for GateError {}
