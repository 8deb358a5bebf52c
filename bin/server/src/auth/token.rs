//! Access and refresh token issuance and verification.
//!
//! Tokens are HS256 JWTs signed with the configured secret. The two tokens
//! of one login share a `jti`, so revoking that one ID denies the whole
//! pair. Verification pins the algorithm before decoding to reject
//! algorithm-confusion forgeries.

use chrono::Duration;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use keygate_core::TokenPairId;
use keygate_identity::{TokenClaims, User};
use std::fmt;

/// Issues and verifies the service's own session tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

/// An access/refresh pair minted in one login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_claims: TokenClaims,
    pub refresh_claims: TokenClaims,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: String, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Signs one token for `user` expiring `ttl` from now.
    fn issue(
        &self,
        user: &User,
        ttl: Duration,
        jti: TokenPairId,
    ) -> Result<(String, TokenClaims), TokenError> {
        let claims = TokenClaims::new(
            user.id(),
            user.email().to_string(),
            user.display_name().map(str::to_string),
            jti,
            ttl,
        );

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok((token, claims))
    }

    /// Mints an access/refresh pair sharing a fresh pair ID.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        let jti = TokenPairId::new();
        let (access_token, access_claims) = self.issue(user, self.access_ttl, jti)?;
        let (refresh_token, refresh_claims) = self.issue(user, self.refresh_ttl, jti)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_claims,
            refresh_claims,
        })
    }

    /// Verifies a token's signature and expiry and recovers its claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Malformed("empty token".to_string()));
        }

        let header =
            decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::HS256 {
            return Err(TokenError::SignatureInvalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::SignatureInvalid(e.to_string())
            }
            _ => TokenError::Malformed(e.to_string()),
        })?;

        Ok(token_data.claims)
    }
}

/// Errors from token issuance and verification.
#[derive(Debug)]
pub enum TokenError {
    /// The token is not a well-formed JWT or its claims do not parse.
    Malformed(String),
    /// The signature or algorithm check failed.
    SignatureInvalid(String),
    /// The token's expiry instant has passed.
    Expired,
    /// Signing failed at issuance.
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed token: {}", msg),
            Self::SignatureInvalid(msg) => write!(f, "invalid token signature: {}", msg),
            Self::Expired => write!(f, "token expired"),
            Self::Signing(msg) => write!(f, "token signing failed: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_identity::{ProviderKind, UserStatus};

    fn test_user() -> User {
        let mut user = User::new(
            ProviderKind::Google,
            "109823".to_string(),
            "alice@example.com".to_string(),
            UserStatus::Active,
        );
        user.set_display_name(Some("Alice".to_string()));
        user
    }

    fn test_service() -> TokenService {
        TokenService::new(
            "test-secret".to_string(),
            Duration::minutes(15),
            Duration::hours(168),
        )
    }

    #[test]
    fn issued_token_verifies_and_carries_user_claims() {
        let service = test_service();
        let user = test_user();

        let pair = service.issue_pair(&user).expect("issue");
        let claims = service.verify(&pair.access_token).expect("verify");

        assert_eq!(claims.sub, user.id());
        assert_eq!(claims.email, user.email());
        assert_eq!(claims.name.as_deref(), user.display_name());
    }

    #[test]
    fn pair_shares_one_jti_with_longer_refresh_expiry() {
        let service = test_service();
        let pair = service.issue_pair(&test_user()).expect("issue");

        assert_eq!(pair.access_claims.jti, pair.refresh_claims.jti);
        assert!(pair.refresh_claims.exp > pair.access_claims.exp);
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = TokenService::new(
            "test-secret".to_string(),
            Duration::seconds(-10),
            Duration::hours(1),
        );
        let pair = service.issue_pair(&test_user()).expect("issue");

        assert!(matches!(
            service.verify(&pair.access_token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let service = test_service();
        let other = TokenService::new(
            "other-secret".to_string(),
            Duration::minutes(15),
            Duration::hours(1),
        );
        let pair = other.issue_pair(&test_user()).expect("issue");

        assert!(matches!(
            service.verify(&pair.access_token),
            Err(TokenError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn token_with_other_algorithm_is_rejected() {
        let service = test_service();
        let claims = TokenClaims::new(
            test_user().id(),
            "alice@example.com".to_string(),
            None,
            TokenPairId::new(),
            Duration::minutes(15),
        );
        let forged = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode");

        assert!(matches!(
            service.verify(&forged),
            Err(TokenError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let service = test_service();
        assert!(matches!(
            service.verify("not.a.jwt"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            service.verify(""),
            Err(TokenError::Malformed(_))
        ));
    }
}
