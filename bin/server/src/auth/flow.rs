//! Login and logout orchestration.
//!
//! `LoginFlow` owns the provider adapters and the persistence seams and
//! runs the two lifecycle operations: trading a provider callback for a
//! token pair, and revoking a pair on logout.

use chrono::Utc;
use keygate_identity::{ProviderIdentity, ProviderKind, Session, User, UserStatus};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::directory::{DirectoryError, SessionStore, UserDirectory};
use super::provider::{IdentityProvider, ProviderError};
use super::revocation::{LedgerError, RevocationLedger};
use super::token::{TokenError, TokenService};

/// What logout does beyond revoking the token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutPolicy {
    /// Revoke the token pair only. The user can log in again immediately.
    #[default]
    RevokeTokens,
    /// Revoke the token pair and set the account status to blocked.
    RevokeAndBlock,
}

/// The result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: chrono::DateTime<Utc>,
    pub refresh_expires_at: chrono::DateTime<Utc>,
    pub user: User,
}

/// Runs the authentication lifecycle against injected seams.
pub struct LoginFlow {
    providers: HashMap<ProviderKind, Arc<dyn IdentityProvider>>,
    directory: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenService,
    ledger: Arc<dyn RevocationLedger>,
    logout_policy: LogoutPolicy,
    new_user_status: UserStatus,
}

impl LoginFlow {
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenService,
        ledger: Arc<dyn RevocationLedger>,
        logout_policy: LogoutPolicy,
        new_user_status: UserStatus,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            directory,
            sessions,
            tokens,
            ledger,
            logout_policy,
            new_user_status,
        }
    }

    /// Registers a provider adapter, keyed by its kind.
    #[must_use]
    pub fn register(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Returns the registered adapter for `kind`, if any.
    pub fn provider(&self, kind: ProviderKind) -> Option<&Arc<dyn IdentityProvider>> {
        self.providers.get(&kind)
    }

    /// Completes a provider callback: exchanges the code, establishes the
    /// identity, provisions the user if needed, and mints a token pair.
    pub async fn login(&self, kind: ProviderKind, code: &str) -> Result<LoginOutcome, LoginError> {
        if code.is_empty() {
            return Err(LoginError::MissingCode);
        }

        let provider = self
            .providers
            .get(&kind)
            .ok_or_else(|| LoginError::UnknownProvider(kind.to_string()))?;

        let tokens = provider.exchange(code).await?;
        let mut identity = provider.fetch_identity(&tokens).await?;

        // A verified assertion is authoritative over the userinfo profile.
        if let Some(asserted) = provider.verify_assertion(&tokens).await? {
            identity.subject = asserted.subject;
            identity.email = asserted.email;
            identity.email_verified = true;
        }

        if !identity.email_verified || identity.email.is_empty() {
            return Err(LoginError::Provider(ProviderError::UntrustedIdentity(
                "no verified email for identity".to_string(),
            )));
        }

        let user = self.resolve_user(kind, &identity).await?;
        let pair = self.tokens.issue_pair(&user)?;

        let session = Session::new(
            user.id(),
            pair.refresh_token.clone(),
            pair.refresh_claims.expires_at(),
            Some(pair.access_token.clone()),
            Some(pair.access_claims.expires_at()),
        );
        self.sessions.create(&session).await?;

        tracing::info!(
            user_id = %user.id(),
            provider = %kind,
            session_id = %session.id(),
            "login completed"
        );

        Ok(LoginOutcome {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_expires_at: pair.access_claims.expires_at(),
            refresh_expires_at: pair.refresh_claims.expires_at(),
            user,
        })
    }

    /// Finds the user owning this provider identity, provisioning one on
    /// first login. Losing a concurrent provisioning race is recovered by
    /// re-finding the winner's record.
    async fn resolve_user(
        &self,
        kind: ProviderKind,
        identity: &ProviderIdentity,
    ) -> Result<User, LoginError> {
        if let Some(user) = self
            .directory
            .find_by_provider_identity(kind, &identity.subject)
            .await?
        {
            return Ok(user);
        }

        let mut user = User::new(
            kind,
            identity.subject.clone(),
            identity.email.clone(),
            self.new_user_status,
        );
        user.set_display_name(identity.display_name.clone());
        user.set_avatar_url(identity.avatar_url.clone());

        match self.directory.create(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id(), provider = %kind, "provisioned new user");
                Ok(user)
            }
            Err(DirectoryError::Duplicate) => self
                .directory
                .find_by_provider_identity(kind, &identity.subject)
                .await?
                .ok_or(LoginError::Directory(DirectoryError::NotFound)),
            Err(e) => Err(e.into()),
        }
    }

    /// Revokes a token pair by its refresh token.
    ///
    /// Revoking an already-revoked pair is a no-op; logout is idempotent.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), LogoutError> {
        if refresh_token.is_empty() {
            return Err(LogoutError::MissingToken);
        }

        let claims = self.tokens.verify(refresh_token)?;
        self.ledger.deny(claims.jti, claims.remaining()).await?;

        // Audit bookkeeping; enforcement already happened in the ledger.
        if let Err(e) = self.sessions.mark_revoked(refresh_token).await {
            tracing::warn!(error = %e, "failed to mark session revoked");
        }

        if self.logout_policy == LogoutPolicy::RevokeAndBlock {
            self.directory
                .set_status(claims.sub, UserStatus::Blocked)
                .await?;
        }

        tracing::info!(user_id = %claims.sub, jti = %claims.jti, "logout completed");
        Ok(())
    }
}

/// Errors from the login operation.
#[derive(Debug)]
pub enum LoginError {
    /// The callback carried no authorization code.
    MissingCode,
    /// No adapter is registered for the requested provider.
    UnknownProvider(String),
    /// A provider adapter failed.
    Provider(ProviderError),
    /// The user directory or session store failed.
    Directory(DirectoryError),
    /// Token issuance failed.
    Token(TokenError),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCode => write!(f, "no authorization code in callback"),
            Self::UnknownProvider(name) => write!(f, "unknown provider '{}'", name),
            Self::Provider(e) => write!(f, "{}", e),
            Self::Directory(e) => write!(f, "{}", e),
            Self::Token(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoginError {}

impl From<ProviderError> for LoginError {
    fn from(e: ProviderError) -> Self {
        Self::Provider(e)
    }
}

impl From<DirectoryError> for LoginError {
    fn from(e: DirectoryError) -> Self {
        Self::Directory(e)
    }
}

impl From<TokenError> for LoginError {
    fn from(e: TokenError) -> Self {
        Self::Token(e)
    }
}

/// Errors from the logout operation.
#[derive(Debug)]
pub enum LogoutError {
    /// No refresh token was supplied.
    MissingToken,
    /// The refresh token failed verification.
    Token(TokenError),
    /// The revocation ledger failed.
    Ledger(LedgerError),
    /// The status update failed.
    Directory(DirectoryError),
}

impl fmt::Display for LogoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => write!(f, "no refresh token supplied"),
            Self::Token(e) => write!(f, "{}", e),
            Self::Ledger(e) => write!(f, "{}", e),
            Self::Directory(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LogoutError {}

impl From<TokenError> for LogoutError {
    fn from(e: TokenError) -> Self {
        Self::Token(e)
    }
}

impl From<LedgerError> for LogoutError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl From<DirectoryError> for LogoutError {
    fn from(e: DirectoryError) -> Self {
        Self::Directory(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{FakeProvider, InMemoryDirectory, InMemoryLedger, InMemorySessions};
    use chrono::Duration;
    use keygate_identity::ProviderIdentity;

    struct Harness {
        flow: LoginFlow,
        directory: Arc<InMemoryDirectory>,
        sessions: Arc<InMemorySessions>,
        ledger: Arc<InMemoryLedger>,
    }

    fn harness_with(policy: LogoutPolicy, provider: FakeProvider) -> Harness {
        let directory = Arc::new(InMemoryDirectory::new());
        let sessions = Arc::new(InMemorySessions::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let tokens = TokenService::new(
            "test-secret".to_string(),
            Duration::minutes(15),
            Duration::hours(168),
        );

        let flow = LoginFlow::new(
            directory.clone(),
            sessions.clone(),
            tokens,
            ledger.clone(),
            policy,
            UserStatus::Active,
        )
        .register(Arc::new(provider));

        Harness {
            flow,
            directory,
            sessions,
            ledger,
        }
    }

    fn google_identity() -> ProviderIdentity {
        ProviderIdentity {
            subject: "109823".to_string(),
            email: "alice@example.com".to_string(),
            email_verified: true,
            display_name: Some("Alice".to_string()),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn first_login_provisions_user_and_records_session() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");

        assert_eq!(outcome.user.email(), "alice@example.com");
        assert_eq!(outcome.user.display_name(), Some("Alice"));
        assert!(outcome.refresh_expires_at > outcome.access_expires_at);
        assert_eq!(h.directory.len(), 1);
        assert_eq!(h.sessions.len(), 1);
    }

    #[tokio::test]
    async fn first_login_applies_the_configured_initial_status() {
        let directory = Arc::new(InMemoryDirectory::new());
        let sessions = Arc::new(InMemorySessions::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let tokens = TokenService::new(
            "test-secret".to_string(),
            Duration::minutes(15),
            Duration::hours(168),
        );

        let flow = LoginFlow::new(
            directory,
            sessions,
            tokens,
            ledger,
            LogoutPolicy::RevokeTokens,
            UserStatus::Pending,
        )
        .register(Arc::new(FakeProvider::new(
            ProviderKind::Google,
            google_identity(),
        )));

        let outcome = flow.login(ProviderKind::Google, "code-1").await.expect("login");
        assert_eq!(outcome.user.status(), UserStatus::Pending);
    }

    #[tokio::test]
    async fn repeat_login_reuses_the_user() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let first = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        let second = h.flow.login(ProviderKind::Google, "code-2").await.expect("login");

        assert_eq!(first.user.id(), second.user.id());
        assert_eq!(h.directory.len(), 1);
        assert_eq!(h.sessions.len(), 2);
    }

    #[tokio::test]
    async fn missing_code_is_rejected() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let result = h.flow.login(ProviderKind::Google, "").await;
        assert!(matches!(result, Err(LoginError::MissingCode)));
    }

    #[tokio::test]
    async fn unregistered_provider_is_rejected() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let result = h.flow.login(ProviderKind::Github, "code-1").await;
        assert!(matches!(result, Err(LoginError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn replayed_code_fails_the_exchange() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        let result = h.flow.login(ProviderKind::Google, "code-1").await;

        assert!(matches!(
            result,
            Err(LoginError::Provider(ProviderError::ExchangeFailed(_)))
        ));
    }

    #[tokio::test]
    async fn unverified_email_is_refused() {
        let mut identity = google_identity();
        identity.email_verified = false;

        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Github, identity),
        );

        let result = h.flow.login(ProviderKind::Github, "code-1").await;
        assert!(matches!(
            result,
            Err(LoginError::Provider(ProviderError::UntrustedIdentity(_)))
        ));
        assert_eq!(h.directory.len(), 0);
    }

    #[tokio::test]
    async fn verified_assertion_overrides_profile_fields() {
        let mut identity = google_identity();
        identity.email_verified = false;
        identity.email = "stale@example.com".to_string();

        let provider = FakeProvider::new(ProviderKind::Google, identity)
            .with_assertion("109823", "alice@example.com");
        let h = harness_with(LogoutPolicy::RevokeTokens, provider);

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        assert_eq!(outcome.user.email(), "alice@example.com");
        assert_eq!(outcome.user.subject(), "109823");
    }

    #[tokio::test]
    async fn lost_provisioning_race_recovers_by_refinding() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        // Simulate another instance inserting between our find and create.
        let racing_winner = User::new(
            ProviderKind::Google,
            "109823".to_string(),
            "alice@example.com".to_string(),
            UserStatus::Active,
        );
        h.directory.insert(racing_winner.clone());
        h.directory.hide_from_find_once();

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");

        assert_eq!(outcome.user.id(), racing_winner.id());
        assert_eq!(h.directory.len(), 1);
    }

    #[tokio::test]
    async fn logout_denies_the_pair_and_is_idempotent() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        h.flow.logout(&outcome.refresh_token).await.expect("logout");
        h.flow.logout(&outcome.refresh_token).await.expect("second logout");

        let claims = TokenService::new(
            "test-secret".to_string(),
            Duration::minutes(15),
            Duration::hours(168),
        )
        .verify(&outcome.refresh_token)
        .expect("verify");
        assert!(h.ledger.contains(claims.jti));
    }

    #[tokio::test]
    async fn logout_marks_the_session_record_revoked() {
        use keygate_identity::SessionStatus;

        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        assert_eq!(
            h.sessions.status_of(&outcome.refresh_token),
            Some(SessionStatus::Active)
        );

        h.flow.logout(&outcome.refresh_token).await.expect("logout");
        assert_eq!(
            h.sessions.status_of(&outcome.refresh_token),
            Some(SessionStatus::Revoked)
        );
    }

    #[tokio::test]
    async fn logout_revokes_the_paired_access_token_at_the_gate() {
        use crate::auth::middleware::{AccessGate, GateError};

        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );
        let tokens = TokenService::new(
            "test-secret".to_string(),
            Duration::minutes(15),
            Duration::hours(168),
        );
        let gate = AccessGate::new(tokens, h.ledger.clone(), h.directory.clone());

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        let header = format!("Bearer {}", outcome.access_token);
        gate.check(Some(&header)).await.expect("admitted before logout");

        h.flow.logout(&outcome.refresh_token).await.expect("logout");

        assert!(matches!(
            gate.check(Some(&header)).await,
            Err(GateError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn logout_leaves_the_account_active_by_default() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        h.flow.logout(&outcome.refresh_token).await.expect("logout");

        let user = h
            .directory
            .find_by_id(outcome.user.id())
            .await
            .expect("find")
            .expect("present");
        assert_eq!(user.status(), UserStatus::Active);
    }

    #[tokio::test]
    async fn revoke_and_block_policy_blocks_the_account() {
        let h = harness_with(
            LogoutPolicy::RevokeAndBlock,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let outcome = h.flow.login(ProviderKind::Google, "code-1").await.expect("login");
        h.flow.logout(&outcome.refresh_token).await.expect("logout");

        let user = h
            .directory
            .find_by_id(outcome.user.id())
            .await
            .expect("find")
            .expect("present");
        assert_eq!(user.status(), UserStatus::Blocked);
    }

    #[tokio::test]
    async fn logout_without_token_is_rejected() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let result = h.flow.logout("").await;
        assert!(matches!(result, Err(LogoutError::MissingToken)));
    }

    #[tokio::test]
    async fn logout_with_garbage_token_is_rejected() {
        let h = harness_with(
            LogoutPolicy::RevokeTokens,
            FakeProvider::new(ProviderKind::Google, google_identity()),
        );

        let result = h.flow.logout("not.a.jwt").await;
        assert!(matches!(result, Err(LogoutError::Token(_))));
    }
}
