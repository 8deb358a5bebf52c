//! API error responses.
//!
//! Every handler failure renders as a JSON body with a stable machine
//! `kind` and a human message. Conversions from the flow and gate errors
//! decide the status mapping in one place; internal details never leak
//! into 5xx bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::auth::flow::{LoginError, LogoutError};
use crate::auth::middleware::GateError;
use crate::auth::provider::ProviderError;

/// An error ready to render as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    kind: &'static str,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unknown_provider(name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "unknown_provider",
            format!("unknown provider '{}'", name),
        )
    }

    #[must_use]
    pub fn missing_login_state() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "missing_login_state",
            "no login state cookie; start the login from /auth/{provider}/login",
        )
    }

    #[must_use]
    pub fn csrf_mismatch() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "state_mismatch",
            "callback state does not match the login state cookie",
        )
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = self.kind, message = %self.message, "request failed");
        }

        let body = ErrorBody {
            status: self.status.as_u16(),
            kind: self.kind,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MissingAuthHeader => Self::new(
                StatusCode::UNAUTHORIZED,
                "missing_authorization",
                "missing authorization header",
            ),
            GateError::AuthHeaderMalformed => Self::new(
                StatusCode::UNAUTHORIZED,
                "malformed_authorization",
                "authorization header must be a bearer token",
            ),
            GateError::TokenInvalid(e) => {
                Self::new(StatusCode::UNAUTHORIZED, "token_invalid", e.to_string())
            }
            GateError::TokenExpired => {
                Self::new(StatusCode::UNAUTHORIZED, "token_expired", "token expired")
            }
            GateError::TokenRevoked => {
                Self::new(StatusCode::UNAUTHORIZED, "token_revoked", "token revoked")
            }
            GateError::UserNotFound => {
                Self::new(StatusCode::UNAUTHORIZED, "user_not_found", "user not found")
            }
            GateError::AccountSuspended => Self::new(
                StatusCode::FORBIDDEN,
                "account_suspended",
                "account is not active",
            ),
            GateError::Internal(msg) => {
                tracing::error!(error = %msg, "access gate backend failure");
                Self::internal()
            }
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::MissingCode => Self::new(
                StatusCode::BAD_REQUEST,
                "missing_code",
                "no authorization code in callback",
            ),
            LoginError::UnknownProvider(name) => Self::unknown_provider(&name),
            LoginError::Provider(ProviderError::ExchangeFailed(msg)) => {
                Self::new(StatusCode::BAD_REQUEST, "exchange_failed", msg)
            }
            LoginError::Provider(ProviderError::IdentityFetchFailed(msg)) => {
                Self::new(StatusCode::BAD_GATEWAY, "identity_fetch_failed", msg)
            }
            LoginError::Provider(ProviderError::UntrustedIdentity(msg)) => {
                Self::new(StatusCode::UNAUTHORIZED, "untrusted_identity", msg)
            }
            LoginError::Provider(ProviderError::Configuration(msg)) => {
                tracing::error!(error = %msg, "provider misconfigured");
                Self::internal()
            }
            LoginError::Directory(e) => {
                tracing::error!(error = %e, "directory failure during login");
                Self::internal()
            }
            LoginError::Token(e) => {
                tracing::error!(error = %e, "token issuance failure during login");
                Self::internal()
            }
        }
    }
}

impl From<LogoutError> for ApiError {
    fn from(err: LogoutError) -> Self {
        match err {
            LogoutError::MissingToken => Self::new(
                StatusCode::BAD_REQUEST,
                "missing_token",
                "no refresh token supplied",
            ),
            LogoutError::Token(e) => {
                Self::new(StatusCode::UNAUTHORIZED, "token_invalid", e.to_string())
            }
            LogoutError::Ledger(e) => {
                tracing::error!(error = %e, "ledger failure during logout");
                Self::internal()
            }
            LogoutError::Directory(e) => {
                tracing::error!(error = %e, "directory failure during logout");
                Self::internal()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenError;

    #[test]
    fn gate_refusals_map_to_auth_statuses() {
        let unauthorized = [
            ApiError::from(GateError::MissingAuthHeader),
            ApiError::from(GateError::AuthHeaderMalformed),
            ApiError::from(GateError::TokenExpired),
            ApiError::from(GateError::TokenRevoked),
            ApiError::from(GateError::UserNotFound),
        ];
        for err in unauthorized {
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }

        let suspended = ApiError::from(GateError::AccountSuspended);
        assert_eq!(suspended.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_failures_do_not_leak_details() {
        let err = ApiError::from(GateError::Internal("redis timeout at 10.0.0.3".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("redis"));
        assert!(!err.message.contains("10.0.0.3"));
    }

    #[test]
    fn login_errors_map_to_caller_statuses() {
        assert_eq!(
            ApiError::from(LoginError::MissingCode).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LoginError::UnknownProvider("gitlab".to_string())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LoginError::Provider(ProviderError::UntrustedIdentity(
                "bad assertion".to_string()
            )))
            .status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(LoginError::Provider(ProviderError::IdentityFetchFailed(
                "503".to_string()
            )))
            .status,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn logout_errors_map_to_caller_statuses() {
        assert_eq!(
            ApiError::from(LogoutError::MissingToken).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LogoutError::Token(TokenError::Expired)).status,
            StatusCode::UNAUTHORIZED
        );
    }
}
