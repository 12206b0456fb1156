use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::auth::guard::{LockedOut, LoginGuard};

/// Stored login material for one identity.
#[derive(Debug, Clone)]
pub struct Credential {
    pub identity: String,
    pub display_name: String,
    pub internal_id: String,
    pub password_hash: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_identity(&self, identity: &str) -> anyhow::Result<Option<Credential>>;
}

#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    async fn verify(&self, candidate: &str, stored: &str) -> anyhow::Result<bool>;

    /// Hash checked when the identity does not exist, so unknown and known
    /// identities take the same path.
    fn decoy_hash(&self) -> &str;
}

pub trait TokenIssuer: Send + Sync {
    fn issue(&self, identity: &str, internal_id: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDescriptor {
    pub email: String,
    pub name: String,
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Wrong email or password")]
    InvalidCredentials,

    #[error(transparent)]
    LockedOut(#[from] LockedOut),

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("Authentication backend error: {0}")]
    Internal(#[source] anyhow::Error),
}

pub struct AuthService {
    guard: Arc<LoginGuard>,
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn PasswordVerifier>,
    tokens: Arc<dyn TokenIssuer>,
}

impl AuthService {
    pub fn new(
        guard: Arc<LoginGuard>,
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn PasswordVerifier>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        AuthService {
            guard,
            store,
            verifier,
            tokens,
        }
    }

    #[cfg(test)]
    pub fn guard(&self) -> &Arc<LoginGuard> {
        &self.guard
    }

    /// Runs one login attempt through the guard.
    ///
    /// The lockout pre-check is read-only and every verified attempt is
    /// recorded exactly once, so a wrong password costs one attempt. Store
    /// and verifier failures are not recorded at all.
    pub async fn check_credentials(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<SessionDescriptor, AuthError> {
        self.guard.check(identity)?;

        let credential = self
            .store
            .find_by_identity(identity)
            .await
            .map_err(|e| {
                tracing::error!("Credential lookup failed: {:?}", e);
                AuthError::StoreUnavailable(e)
            })?;

        let stored_hash = credential
            .as_ref()
            .map(|c| c.password_hash.as_str())
            .unwrap_or_else(|| self.verifier.decoy_hash());
        let matched = self
            .verifier
            .verify(secret, stored_hash)
            .await
            .map_err(AuthError::Internal)?;

        match credential {
            Some(credential) if matched => {
                let token = self
                    .tokens
                    .issue(&credential.identity, &credential.internal_id)
                    .map_err(AuthError::Internal)?;
                self.guard.record_attempt(identity, true)?;
                tracing::info!("Login succeeded for {}", credential.identity);
                Ok(SessionDescriptor {
                    email: credential.identity,
                    name: credential.display_name,
                    user_id: credential.internal_id,
                    token,
                })
            }
            _ => {
                self.guard.record_attempt(identity, false)?;
                tracing::debug!(
                    "Login failed for {} ({:?})",
                    identity,
                    self.guard.status(identity)
                );
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::guard::{AttemptState, LockoutPolicy, MAX_ATTEMPTS};

    const DECOY: &str = "decoy-hash";

    #[derive(Default)]
    struct FakeStore {
        users: HashMap<String, Credential>,
        unavailable: bool,
        lookups: AtomicUsize,
    }

    impl FakeStore {
        fn with_user(identity: &str, password: &str) -> Self {
            let mut users = HashMap::new();
            users.insert(
                identity.to_string(),
                Credential {
                    identity: identity.to_string(),
                    display_name: "Test User".to_string(),
                    internal_id: "user-1".to_string(),
                    password_hash: format!("hashed:{}", password),
                },
            );
            FakeStore {
                users,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CredentialStore for FakeStore {
        async fn find_by_identity(&self, identity: &str) -> anyhow::Result<Option<Credential>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.unavailable {
                anyhow::bail!("connection refused");
            }
            Ok(self.users.get(identity).cloned())
        }
    }

    #[derive(Default)]
    struct FakeVerifier {
        checked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PasswordVerifier for FakeVerifier {
        async fn verify(&self, candidate: &str, stored: &str) -> anyhow::Result<bool> {
            self.checked.lock().unwrap().push(stored.to_string());
            Ok(stored == format!("hashed:{}", candidate))
        }

        fn decoy_hash(&self) -> &str {
            DECOY
        }
    }

    struct FakeTokens;

    impl TokenIssuer for FakeTokens {
        fn issue(&self, identity: &str, internal_id: &str) -> anyhow::Result<String> {
            Ok(format!("token:{}:{}", identity, internal_id))
        }
    }

    struct BrokenTokens;

    impl TokenIssuer for BrokenTokens {
        fn issue(&self, _identity: &str, _internal_id: &str) -> anyhow::Result<String> {
            anyhow::bail!("signing key unavailable")
        }
    }

    struct Harness {
        service: AuthService,
        store: Arc<FakeStore>,
        verifier: Arc<FakeVerifier>,
        clock: Arc<ManualClock>,
    }

    fn harness(store: FakeStore) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(store);
        let verifier = Arc::new(FakeVerifier::default());
        let service = AuthService::new(
            Arc::new(LoginGuard::new(clock.clone())),
            store.clone(),
            verifier.clone(),
            Arc::new(FakeTokens),
        );
        Harness {
            service,
            store,
            verifier,
            clock,
        }
    }

    #[tokio::test]
    async fn test_valid_credentials_issue_session() {
        let h = harness(FakeStore::with_user("a@x.com", "secret"));
        let session = h.service.check_credentials("a@x.com", "secret").await.unwrap();
        assert_eq!(
            session,
            SessionDescriptor {
                email: "a@x.com".to_string(),
                name: "Test User".to_string(),
                user_id: "user-1".to_string(),
                token: "token:a@x.com:user-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_wrong_password_counts_once() {
        let h = harness(FakeStore::with_user("a@x.com", "secret"));
        let err = h.service.check_credentials("a@x.com", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(h.service.guard().failure_count("a@x.com"), 1);
    }

    #[tokio::test]
    async fn test_unknown_identity_uses_decoy() {
        let h = harness(FakeStore::default());
        let err = h.service.check_credentials("ghost@x.com", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(*h.verifier.checked.lock().unwrap(), vec![DECOY.to_string()]);
        assert_eq!(h.service.guard().failure_count("ghost@x.com"), 1);
    }

    #[tokio::test]
    async fn test_fifth_failure_reports_lockout() {
        let h = harness(FakeStore::with_user("b@x.com", "secret"));
        for _ in 0..MAX_ATTEMPTS - 1 {
            let err = h.service.check_credentials("b@x.com", "bad").await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        let err = h.service.check_credentials("b@x.com", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::LockedOut(_)));
    }

    #[tokio::test]
    async fn test_locked_out_even_with_valid_secret() {
        let h = harness(FakeStore::with_user("b@x.com", "secret"));
        for _ in 0..MAX_ATTEMPTS {
            let _ = h.service.check_credentials("b@x.com", "bad").await;
            h.clock.advance(Duration::from_secs(60));
        }
        let lookups = h.store.lookups.load(Ordering::SeqCst);

        let err = h.service.check_credentials("b@x.com", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::LockedOut(_)));
        // rejected before reaching the store
        assert_eq!(h.store.lookups.load(Ordering::SeqCst), lookups);
    }

    #[tokio::test]
    async fn test_unknown_identity_locks_like_known_one() {
        let h = harness(FakeStore::default());
        for _ in 0..MAX_ATTEMPTS {
            let _ = h.service.check_credentials("ghost@x.com", "bad").await;
        }
        let err = h.service.check_credentials("ghost@x.com", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::LockedOut(_)));
    }

    #[tokio::test]
    async fn test_success_after_failures_resets() {
        let h = harness(FakeStore::with_user("a@x.com", "secret"));
        for _ in 0..4 {
            let _ = h.service.check_credentials("a@x.com", "bad").await;
        }
        h.service.check_credentials("a@x.com", "secret").await.unwrap();
        assert_eq!(h.service.guard().status("a@x.com"), AttemptState::Clear);

        let err = h.service.check_credentials("a@x.com", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(h.service.guard().failure_count("a@x.com"), 1);
    }

    #[tokio::test]
    async fn test_login_allowed_after_window() {
        let h = harness(FakeStore::with_user("c@x.com", "secret"));
        for _ in 0..MAX_ATTEMPTS {
            let _ = h.service.check_credentials("c@x.com", "bad").await;
        }
        h.clock.advance(Duration::from_secs(31 * 60));

        let err = h.service.check_credentials("c@x.com", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(h.service.guard().failure_count("c@x.com"), 1);
        assert!(h.service.check_credentials("c@x.com", "secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_is_not_an_attempt() {
        let h = harness(FakeStore {
            unavailable: true,
            ..Default::default()
        });
        let err = h.service.check_credentials("a@x.com", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
        assert_eq!(h.service.guard().failure_count("a@x.com"), 0);
    }

    #[tokio::test]
    async fn test_token_failure_keeps_failure_history() {
        let clock = Arc::new(ManualClock::new());
        let guard = Arc::new(LoginGuard::new(clock));
        let service = AuthService::new(
            guard.clone(),
            Arc::new(FakeStore::with_user("a@x.com", "secret")),
            Arc::new(FakeVerifier::default()),
            Arc::new(BrokenTokens),
        );
        for _ in 0..3 {
            let _ = service.check_credentials("a@x.com", "bad").await;
        }

        let err = service.check_credentials("a@x.com", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        assert_eq!(guard.failure_count("a@x.com"), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_bad_logins_are_all_counted() {
        let clock = Arc::new(ManualClock::new());
        let policy = LockoutPolicy {
            max_attempts: 1_000,
            ..LockoutPolicy::default()
        };
        let guard = Arc::new(LoginGuard::with_policy(policy, clock));
        let service = Arc::new(AuthService::new(
            guard.clone(),
            Arc::new(FakeStore::with_user("a@x.com", "secret")),
            Arc::new(FakeVerifier::default()),
            Arc::new(FakeTokens),
        ));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.check_credentials("a@x.com", "bad").await })
            })
            .collect();
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        assert_eq!(guard.failure_count("a@x.com"), 50);
        assert_eq!(guard.failure_count("b@x.com"), 0);
    }
}
