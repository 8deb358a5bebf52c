//! In-memory fakes for the flow and gate seams.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use keygate_core::{TokenPairId, UserId};
use keygate_identity::{ProviderIdentity, ProviderKind, Session, SessionStatus, User, UserStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::directory::{DirectoryError, SessionStore, UserDirectory};
use super::provider::{
    AssertedIdentity, IdentityProvider, LoginState, ProviderError, ProviderTokens,
};
use super::revocation::{LedgerError, RevocationLedger};

/// Provider fake serving a fixed identity. Codes are one-time use, matching
/// real authorization servers.
pub(crate) struct FakeProvider {
    kind: ProviderKind,
    identity: ProviderIdentity,
    asserted: Option<AssertedIdentity>,
    codes_seen: Mutex<HashSet<String>>,
}

impl FakeProvider {
    pub(crate) fn new(kind: ProviderKind, identity: ProviderIdentity) -> Self {
        Self {
            kind,
            identity,
            asserted: None,
            codes_seen: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn with_assertion(mut self, subject: &str, email: &str) -> Self {
        self.asserted = Some(AssertedIdentity {
            subject: subject.to_string(),
            email: email.to_string(),
        });
        self
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn authorization_url(&self) -> (String, LoginState) {
        let state = TokenPairId::new().as_ulid().to_string();
        (
            format!("https://provider.test/authorize?state={}", state),
            LoginState { csrf_token: state },
        )
    }

    async fn exchange(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let mut seen = self.codes_seen.lock().expect("lock");
        if !seen.insert(code.to_string()) {
            return Err(ProviderError::ExchangeFailed(
                "authorization code already redeemed".to_string(),
            ));
        }
        Ok(ProviderTokens {
            access_token: format!("fake-access-{}", code),
            id_token: None,
        })
    }

    async fn verify_assertion(
        &self,
        _tokens: &ProviderTokens,
    ) -> Result<Option<AssertedIdentity>, ProviderError> {
        Ok(self.asserted.clone())
    }

    async fn fetch_identity(
        &self,
        _tokens: &ProviderTokens,
    ) -> Result<ProviderIdentity, ProviderError> {
        Ok(self.identity.clone())
    }
}

/// User directory fake enforcing the same uniqueness rules as the schema.
pub(crate) struct InMemoryDirectory {
    users: Mutex<HashMap<UserId, User>>,
    hide_once: AtomicBool,
}

impl InMemoryDirectory {
    pub(crate) fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            hide_once: AtomicBool::new(false),
        }
    }

    pub(crate) fn insert(&self, user: User) {
        self.users.lock().expect("lock").insert(user.id(), user);
    }

    /// Makes the next provider-identity lookup miss, simulating a
    /// provisioning race where another instance inserts concurrently.
    pub(crate) fn hide_from_find_once(&self) {
        self.hide_once.store(true, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.users.lock().expect("lock").len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_provider_identity(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> Result<Option<User>, DirectoryError> {
        if self.hide_once.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .users
            .lock()
            .expect("lock")
            .values()
            .find(|u| u.provider() == provider && u.subject() == subject)
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.lock().expect("lock").get(&id).cloned())
    }

    async fn create(&self, user: &User) -> Result<(), DirectoryError> {
        let mut users = self.users.lock().expect("lock");
        let conflict = users.values().any(|u| {
            (u.provider() == user.provider() && u.subject() == user.subject())
                || u.email() == user.email()
        });
        if conflict {
            return Err(DirectoryError::Duplicate);
        }
        users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn set_status(&self, id: UserId, status: UserStatus) -> Result<(), DirectoryError> {
        let mut users = self.users.lock().expect("lock");
        match users.get_mut(&id) {
            Some(user) => {
                user.set_status(status);
                Ok(())
            }
            None => Err(DirectoryError::NotFound),
        }
    }
}

/// Session store fake recording every insert.
pub(crate) struct InMemorySessions {
    sessions: Mutex<Vec<Session>>,
}

impl InMemorySessions {
    pub(crate) fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().expect("lock").len()
    }

    pub(crate) fn status_of(&self, refresh_token: &str) -> Option<SessionStatus> {
        self.sessions
            .lock()
            .expect("lock")
            .iter()
            .find(|s| s.refresh_token() == refresh_token)
            .map(Session::status)
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn create(&self, session: &Session) -> Result<(), DirectoryError> {
        self.sessions.lock().expect("lock").push(session.clone());
        Ok(())
    }

    async fn mark_revoked(&self, refresh_token: &str) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.lock().expect("lock");
        for session in sessions.iter_mut() {
            if session.refresh_token() == refresh_token {
                session.set_status(SessionStatus::Revoked);
            }
        }
        Ok(())
    }
}

/// Revocation ledger fake honoring entry TTLs.
pub(crate) struct InMemoryLedger {
    entries: Mutex<HashMap<TokenPairId, DateTime<Utc>>>,
}

impl InMemoryLedger {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn contains(&self, jti: TokenPairId) -> bool {
        self.entries.lock().expect("lock").contains_key(&jti)
    }
}

#[async_trait]
impl RevocationLedger for InMemoryLedger {
    async fn deny(&self, jti: TokenPairId, ttl: Duration) -> Result<(), LedgerError> {
        if ttl <= Duration::zero() {
            return Ok(());
        }
        self.entries
            .lock()
            .expect("lock")
            .insert(jti, Utc::now() + ttl);
        Ok(())
    }

    async fn is_denied(&self, jti: TokenPairId) -> Result<bool, LedgerError> {
        Ok(self
            .entries
            .lock()
            .expect("lock")
            .get(&jti)
            .is_some_and(|expiry| *expiry > Utc::now()))
    }
}
