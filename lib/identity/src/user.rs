//! User domain type and account status.
//!
//! A User is created after the first successful login from a given provider
//! identity. The `(provider, subject)` pair is the natural key; the internal
//! `UserId` is used everywhere else.

use chrono::{DateTime, Utc};
use keygate_core::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::provider::ProviderKind;

/// Account status of a user.
///
/// Only `Active` users are admitted by the access gate. `Blocked` is set by
/// logout when the revoke-and-block policy is configured; `Banned` is an
/// operator decision and never set by the login flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Blocked,
    Banned,
}

impl UserStatus {
    /// Returns the status as its storage/wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Banned => "banned",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a status from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    /// The value that failed to parse.
    pub value: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown user status '{}'", self.value)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for UserStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            "banned" => Ok(Self::Banned),
            other => Err(ParseStatusError {
                value: other.to_string(),
            }),
        }
    }
}

/// Represents a provisioned user of the platform.
///
/// Users are identified by the identity provider's subject claim together
/// with the provider name. Email is required (providers without a verified
/// email are rejected before a user is ever constructed) but is not the
/// natural key: the same address may appear under different providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal platform user ID.
    id: UserId,
    /// Verified email address from the identity provider.
    email: String,
    /// Display name, if the provider supplied one.
    display_name: Option<String>,
    /// Avatar URL, if the provider supplied one.
    avatar_url: Option<String>,
    /// Which identity provider authenticated this user.
    provider: ProviderKind,
    /// The provider's stable identifier for this user.
    subject: String,
    /// Account status.
    status: UserStatus,
    /// When the user record was created.
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user from a provider identity.
    ///
    /// The user ID is generated automatically. Use this when provisioning a
    /// user after their first authentication.
    #[must_use]
    pub fn new(provider: ProviderKind, subject: String, email: String, status: UserStatus) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email,
            display_name: None,
            avatar_url: None,
            provider,
            subject,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        email: String,
        display_name: Option<String>,
        avatar_url: Option<String>,
        provider: ProviderKind,
        subject: String,
        status: UserStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            display_name,
            avatar_url,
            provider,
            subject,
            status,
            created_at,
            updated_at,
        }
    }

    /// Returns the user's internal platform ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the user's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the user's display name, if available.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the user's avatar URL, if available.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// Returns the identity provider that authenticated the user.
    #[must_use]
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Returns the provider-scoped subject ID.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the account status.
    #[must_use]
    pub fn status(&self) -> UserStatus {
        self.status
    }

    /// Returns true if the user may pass the access gate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Returns when the user was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the user was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sets the user's display name.
    pub fn set_display_name(&mut self, display_name: Option<String>) {
        self.display_name = display_name;
        self.updated_at = Utc::now();
    }

    /// Sets the user's avatar URL.
    pub fn set_avatar_url(&mut self, avatar_url: Option<String>) {
        self.avatar_url = avatar_url;
        self.updated_at = Utc::now();
    }

    /// Sets the account status.
    pub fn set_status(&mut self, status: UserStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
