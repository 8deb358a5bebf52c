//! Persisted session records.
//!
//! A Session is the audit trail of one issued token pair. Expiry is enforced
//! by the token verifier reading claims, never by querying session rows.

use chrono::{DateTime, Utc};
use keygate_core::{SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Audit status of a session record.
///
/// `Revoked` is bookkeeping only; enforcement happens in the revocation
/// ledger, not by querying session rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Revoked,
}

impl SessionStatus {
    /// Returns the status as its storage/wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a session status from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSessionStatusError {
    /// The value that failed to parse.
    pub value: String,
}

impl fmt::Display for ParseSessionStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session status '{}'", self.value)
    }
}

impl std::error::Error for ParseSessionStatusError {}

impl FromStr for SessionStatus {
    type Err = ParseSessionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            other => Err(ParseSessionStatusError {
                value: other.to_string(),
            }),
        }
    }
}

/// Record of one issued access/refresh token pair.
///
/// Created at successful login; logout marks the record revoked for the
/// audit trail but never consults it for enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session record.
    id: SessionId,
    /// The user the token pair was issued to.
    user_id: UserId,
    /// The refresh token value.
    refresh_token: String,
    /// The access token value, if recorded.
    access_token: Option<String>,
    /// Audit status.
    status: SessionStatus,
    /// When the access token expires, if recorded.
    access_expires_at: Option<DateTime<Utc>>,
    /// When the refresh token expires.
    refresh_expires_at: DateTime<Utc>,
    /// When the session record was created.
    created_at: DateTime<Utc>,
    /// When the session record was last updated.
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new active session record for an issued token pair.
    #[must_use]
    pub fn new(
        user_id: UserId,
        refresh_token: String,
        refresh_expires_at: DateTime<Utc>,
        access_token: Option<String>,
        access_expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            refresh_token,
            access_token,
            status: SessionStatus::Active,
            access_expires_at,
            refresh_expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a session record with all fields specified.
    ///
    /// Use this when reconstituting a session from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: SessionId,
        user_id: UserId,
        refresh_token: String,
        access_token: Option<String>,
        status: SessionStatus,
        access_expires_at: Option<DateTime<Utc>>,
        refresh_expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            refresh_token,
            access_token,
            status,
            access_expires_at,
            refresh_expires_at,
            created_at,
            updated_at,
        }
    }

    /// Returns the session record ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the owning user's ID.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the refresh token value.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Returns the access token value, if recorded.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Returns the audit status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns when the access token expires, if recorded.
    #[must_use]
    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_expires_at
    }

    /// Returns when the refresh token expires.
    #[must_use]
    pub fn refresh_expires_at(&self) -> DateTime<Utc> {
        self.refresh_expires_at
    }

    /// Returns when the session record was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session record was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Marks the session revoked.
    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
