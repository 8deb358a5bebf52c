//! Postgres-backed user directory and session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keygate_core::{ParseIdError, SessionId, UserId};
use keygate_identity::{
    ParseProviderError, ParseStatusError, ProviderKind, Session, User, UserStatus,
};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;

/// Capability interface for user lookup and provisioning.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds the user owned by a provider identity, if provisioned.
    async fn find_by_provider_identity(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> Result<Option<User>, DirectoryError>;

    /// Finds a user by ID.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError>;

    /// Provisions a new user record.
    ///
    /// Answers `DirectoryError::Duplicate` when a uniqueness constraint is
    /// violated, so callers can re-find after losing a provisioning race.
    async fn create(&self, user: &User) -> Result<(), DirectoryError>;

    /// Updates a user's account status.
    async fn set_status(&self, id: UserId, status: UserStatus) -> Result<(), DirectoryError>;
}

/// Capability interface for persisting session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Records an issued token pair.
    async fn create(&self, session: &Session) -> Result<(), DirectoryError>;

    /// Marks the session holding this refresh token as revoked.
    ///
    /// Audit bookkeeping only; matching zero rows is not an error.
    async fn mark_revoked(&self, refresh_token: &str) -> Result<(), DirectoryError>;
}

/// Errors from the directory and session store.
#[derive(Debug)]
pub enum DirectoryError {
    /// The requested record does not exist.
    NotFound,
    /// An insert violated a uniqueness constraint.
    Duplicate,
    /// The database failed or returned an unreadable row.
    Database(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Duplicate => write!(f, "record already exists"),
            Self::Database(msg) => write!(f, "database error: {}", msg),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<sqlx::Error> for DirectoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // 23505 is Postgres unique_violation.
            if db.code().as_deref() == Some("23505") {
                return Self::Duplicate;
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<ParseIdError> for DirectoryError {
    fn from(err: ParseIdError) -> Self {
        Self::Database(format!("unreadable row: {}", err))
    }
}

impl From<ParseProviderError> for DirectoryError {
    fn from(err: ParseProviderError) -> Self {
        Self::Database(format!("unreadable row: {}", err))
    }
}

impl From<ParseStatusError> for DirectoryError {
    fn from(err: ParseStatusError) -> Self {
        Self::Database(format!("unreadable row: {}", err))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    provider: String,
    subject: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DirectoryError> {
        Ok(User::with_all_fields(
            UserId::from_str(&self.id)?,
            self.email,
            self.display_name,
            self.avatar_url,
            ProviderKind::from_str(&self.provider)?,
            self.subject,
            UserStatus::from_str(&self.status)?,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// User directory backed by Postgres.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_provider_identity(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> Result<Option<User>, DirectoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, display_name, avatar_url, provider, subject, status, \
                    created_at, updated_at \
             FROM users WHERE provider = $1 AND subject = $2",
        )
        .bind(provider.as_str())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, display_name, avatar_url, provider, subject, status, \
                    created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn create(&self, user: &User) -> Result<(), DirectoryError> {
        sqlx::query(
            "INSERT INTO users \
                 (id, email, display_name, avatar_url, provider, subject, status, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(user.id().to_string())
        .bind(user.email())
        .bind(user.display_name())
        .bind(user.avatar_url())
        .bind(user.provider().as_str())
        .bind(user.subject())
        .bind(user.status().as_str())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status(&self, id: UserId, status: UserStatus) -> Result<(), DirectoryError> {
        let result = sqlx::query("UPDATE users SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }
}

/// Session store backed by Postgres.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &Session) -> Result<(), DirectoryError> {
        sqlx::query(
            "INSERT INTO sessions \
                 (id, user_id, refresh_token, access_token, status, access_expires_at, \
                  refresh_expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(session.id().to_string())
        .bind(session.user_id().to_string())
        .bind(session.refresh_token())
        .bind(session.access_token())
        .bind(session.status().as_str())
        .bind(session.access_expires_at())
        .bind(session.refresh_expires_at())
        .bind(session.created_at())
        .bind(session.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_revoked(&self, refresh_token: &str) -> Result<(), DirectoryError> {
        sqlx::query(
            "UPDATE sessions SET status = 'revoked', updated_at = NOW() \
             WHERE refresh_token = $1",
        )
        .bind(refresh_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
