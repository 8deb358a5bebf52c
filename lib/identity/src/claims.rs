//! Signed token claims.
//!
//! TokenClaims is the payload embedded in every access and refresh token.
//! It is transient: minted at issuance, recovered at verification, never
//! persisted as an object.

use chrono::{DateTime, Duration, TimeZone, Utc};
use keygate_core::{TokenPairId, UserId};
use serde::{Deserialize, Serialize};

/// Claims carried by a signed session token.
///
/// The access and refresh tokens minted in one login share the same `jti`
/// (pair ID), so a single revocation entry denies both. Expiry is strictly
/// checked on every verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The authenticated user's ID.
    pub sub: UserId,
    /// The user's email address at issuance time.
    pub email: String,
    /// The user's display name at issuance time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token pair ID shared by the access and refresh tokens of one login.
    pub jti: TokenPairId,
    /// Issuance instant as unix seconds.
    pub iat: i64,
    /// Expiry instant as unix seconds.
    pub exp: i64,
}

impl TokenClaims {
    /// Creates claims expiring `ttl` from now.
    #[must_use]
    pub fn new(
        sub: UserId,
        email: String,
        name: Option<String>,
        jti: TokenPairId,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub,
            email,
            name,
            jti,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Returns the expiry instant.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(|| DateTime::<Utc>::MAX_UTC)
    }

    /// Returns the remaining validity window from now.
    ///
    /// Non-positive once the token has expired; used as the TTL of the
    /// revocation entry denying this token.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at() - Utc::now()
    }

    /// Returns true if the expiry instant is at or before now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}
