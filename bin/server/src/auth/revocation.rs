//! Revocation ledger.
//!
//! Logout writes the token pair ID here with a TTL matching the refresh
//! token's remaining life; the access gate checks membership on every
//! request. Entries expire on their own, the ledger never needs cleanup.

use async_trait::async_trait;
use chrono::Duration;
use keygate_core::TokenPairId;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::fmt;

/// Capability interface for the deny list of revoked token pairs.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Marks a token pair as denied for `ttl` from now.
    ///
    /// A non-positive `ttl` is a no-op: the tokens are already expired and
    /// will fail verification anyway.
    async fn deny(&self, jti: TokenPairId, ttl: Duration) -> Result<(), LedgerError>;

    /// Answers whether a token pair has been denied.
    async fn is_denied(&self, jti: TokenPairId) -> Result<bool, LedgerError>;
}

/// Redis-backed revocation ledger.
#[derive(Clone)]
pub struct RedisLedger {
    conn: ConnectionManager,
}

impl RedisLedger {
    /// Connects to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let client =
            redis::Client::open(url).map_err(|e| LedgerError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LedgerError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    fn key(jti: TokenPairId) -> String {
        format!("revoked:{}", jti)
    }
}

#[async_trait]
impl RevocationLedger for RedisLedger {
    async fn deny(&self, jti: TokenPairId, ttl: Duration) -> Result<(), LedgerError> {
        let secs = ttl.num_seconds();
        if secs <= 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(jti), 1u8, secs as u64)
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn is_denied(&self, jti: TokenPairId) -> Result<bool, LedgerError> {
        let mut conn = self.conn.clone();
        conn.exists(Self::key(jti))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))
    }
}

/// Errors from the revocation ledger.
#[derive(Debug)]
pub enum LedgerError {
    /// Could not establish the backend connection.
    Connection(String),
    /// A backend command failed.
    Backend(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "ledger connection error: {}", msg),
            Self::Backend(msg) => write!(f, "ledger backend error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}
