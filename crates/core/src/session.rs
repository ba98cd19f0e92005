//! Session component.
//!
//! A [`Session`] is the explicit context object every other component receives to learn who
//! is acting. It wraps one identity provider client and mirrors its sign-in state as a
//! [`SessionState`]:
//!
//! - `Loading` until the first identity notification has been processed
//! - `Anonymous` when nobody is signed in (or the signed-in account has no profile)
//! - `Authenticated` with the [`Account`] profile loaded from the `users` collection
//!
//! Route guards must wait for the state to leave `Loading` before deciding where to send the
//! user; see [`Session::ready`].

use crate::cancel::LivenessToken;
use crate::config::CoreConfig;
use crate::error::{AuthError, PortalError, PortalResult};
use crate::identity::IdentityProvider;
use crate::ids::AccountId;
use crate::model::{encode, Account, AccountProfile, Role};
use crate::store::{Collection, DocumentStore};
use portal_types::{InsuranceNumber, NonEmptyText};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Anonymous,
    Authenticated(Account),
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            SessionState::Authenticated(account) => Some(account),
            _ => None,
        }
    }

    fn is_account(&self, id: &AccountId) -> bool {
        self.account().is_some_and(|account| &account.id == id)
    }
}

/// Everything needed to open a new account.
#[derive(Clone, Debug)]
pub struct Registration {
    pub insurance_number: InsuranceNumber,
    pub password: String,
    pub name: NonEmptyText,
    pub role: Role,
}

pub struct Session {
    cfg: Arc<CoreConfig>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Creates a session in the `Loading` state.
    ///
    /// Nothing is read until [`rehydrate`](Self::rehydrate) runs or the caller logs in.
    pub fn new(
        cfg: Arc<CoreConfig>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            cfg,
            identity,
            store,
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.state.borrow().account().cloned()
    }

    /// The signed-in account, or [`AuthError::NotSignedIn`].
    pub fn require_account(&self) -> PortalResult<Account> {
        self.current_account()
            .ok_or_else(|| AuthError::NotSignedIn.into())
    }

    /// Waits until the session has left `Loading` and returns the settled state.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// Registers a new account and signs into it.
    ///
    /// The identity account is created first; the profile document is then written to
    /// `users` under the new account id.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AlreadyRegistered`] if the insurance number is taken
    /// - [`AuthError::WeakPassword`] if the provider rejects the password
    /// - [`AuthError::Provisioning`] if the profile document could not be written; the
    ///   identity account then exists without a profile
    pub async fn register(&self, registration: Registration) -> PortalResult<Account> {
        let Registration {
            insurance_number,
            password,
            name,
            role,
        } = registration;

        let login_id = insurance_number.login_id(self.cfg.login_domain());
        let account_id = self
            .identity
            .create_account(&login_id, &password)
            .await
            .map_err(AuthError::from)?;

        let profile = AccountProfile {
            insurance_number,
            role,
            name,
        };
        let fields = encode(&profile)?;

        if let Err(e) = self.store.set(Collection::Users, &account_id, fields).await {
            tracing::error!(%account_id, "identity account created but profile write failed: {e}");
            return Err(AuthError::Provisioning(e).into());
        }

        let account = Account {
            id: account_id,
            profile,
        };
        tracing::info!(account_id = %account.id, role = %role, "account registered");
        self.state
            .send_replace(SessionState::Authenticated(account.clone()));
        Ok(account)
    }

    /// Signs in with an insurance number and password.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] on a bad insurance number or password
    /// - [`AuthError::ProfileMissing`] if the identity account exists but no `users`
    ///   document was ever written for it; the provider session is ended again
    pub async fn login(
        &self,
        insurance_number: &InsuranceNumber,
        password: &str,
    ) -> PortalResult<Account> {
        let login_id = insurance_number.login_id(self.cfg.login_domain());
        let account_id = self
            .identity
            .authenticate(&login_id, password)
            .await
            .map_err(AuthError::from)?;

        match self.load_profile(&account_id).await {
            Ok(account) => {
                tracing::info!(account_id = %account.id, "signed in");
                self.state
                    .send_replace(SessionState::Authenticated(account.clone()));
                Ok(account)
            }
            Err(e) => {
                tracing::warn!(%account_id, "sign-in rejected: {e}");
                if let Err(end) = self.identity.end_session().await {
                    tracing::warn!(%account_id, "failed to end provider session: {end}");
                }
                self.state.send_replace(SessionState::Anonymous);
                Err(e)
            }
        }
    }

    /// Signs out.
    ///
    /// Local state is cleared whether or not the provider acknowledges the sign-out.
    pub async fn logout(&self) -> PortalResult<()> {
        self.state.send_replace(SessionState::Anonymous);
        self.identity
            .end_session()
            .await
            .map_err(|e| PortalError::from(AuthError::from(e)))
    }

    /// Follows identity provider notifications until `token` is cancelled.
    ///
    /// The provider's state at subscription time is processed first, which moves the session
    /// out of `Loading`.
    pub async fn rehydrate(&self, token: &LivenessToken) {
        let mut changes = self.identity.subscribe();

        loop {
            let requested = changes.borrow_and_update().clone();
            let Some(resolved) = token.guard(self.resolve(requested.as_ref())).await else {
                return;
            };
            self.apply(requested, resolved);

            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = token.cancelled() => return,
            }
        }
    }

    /// Spawns [`rehydrate`](Self::rehydrate) on the runtime.
    pub fn spawn_rehydrate(self: &Arc<Self>, token: LivenessToken) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.rehydrate(&token).await })
    }

    async fn resolve(&self, requested: Option<&AccountId>) -> Option<PortalResult<Account>> {
        let account_id = requested?;
        let settled = self
            .current_account()
            .filter(|account| &account.id == account_id);
        if let Some(account) = settled {
            return Some(Ok(account));
        }
        Some(self.load_profile(account_id).await)
    }

    fn apply(&self, requested: Option<AccountId>, resolved: Option<PortalResult<Account>>) {
        match (requested, resolved) {
            (_, Some(Ok(account))) => {
                self.state.send_replace(SessionState::Authenticated(account));
            }
            (Some(account_id), Some(Err(e))) => {
                tracing::warn!(%account_id, "signed-in account has no usable profile: {e}");
                // A concurrent register/login may already have settled this account.
                self.state.send_if_modified(|state| {
                    if state.is_account(&account_id) {
                        return false;
                    }
                    *state = SessionState::Anonymous;
                    true
                });
            }
            _ => {
                self.state.send_replace(SessionState::Anonymous);
            }
        }
    }

    async fn load_profile(&self, account_id: &AccountId) -> PortalResult<Account> {
        let doc = self
            .store
            .get(Collection::Users, account_id)
            .await
            .map_err(PortalError::Fetch)?
            .ok_or_else(|| AuthError::ProfileMissing(account_id.clone()))?;
        Account::from_document(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityDirectory;
    use crate::ids::DocumentId;
    use crate::store::testing::FlakyStore;
    use crate::store::MemoryDocumentStore;
    use std::time::Duration;

    struct Fixture {
        cfg: Arc<CoreConfig>,
        directory: Arc<MemoryIdentityDirectory>,
        store: Arc<MemoryDocumentStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cfg: Arc::new(CoreConfig::default()),
                directory: MemoryIdentityDirectory::new(6),
                store: Arc::new(MemoryDocumentStore::new()),
            }
        }

        fn session(&self) -> Session {
            Session::new(
                self.cfg.clone(),
                Arc::new(self.directory.client()),
                self.store.clone(),
            )
        }
    }

    fn registration(number: &str, role: Role) -> Registration {
        Registration {
            insurance_number: InsuranceNumber::parse(number).unwrap(),
            password: "secret1".into(),
            name: NonEmptyText::new(format!("User {number}")).unwrap(),
            role,
        }
    }

    #[tokio::test]
    async fn new_session_is_loading() {
        let fixture = Fixture::new();
        assert_eq!(fixture.session().state(), SessionState::Loading);
    }

    #[tokio::test]
    async fn register_writes_profile_and_authenticates() {
        let fixture = Fixture::new();
        let session = fixture.session();

        let account = session
            .register(registration("1001", Role::Doctor))
            .await
            .expect("register should succeed");

        assert_eq!(session.current_account(), Some(account.clone()));
        let stored = fixture
            .store
            .get(Collection::Users, &account.id)
            .await
            .unwrap()
            .expect("profile should be stored under the account id");
        assert_eq!(stored.fields["role"], "doctor");
        assert_eq!(stored.fields["insuranceNumber"], "1001");
    }

    #[tokio::test]
    async fn register_twice_is_an_auth_error() {
        let fixture = Fixture::new();
        fixture
            .session()
            .register(registration("1001", Role::Patient))
            .await
            .unwrap();

        let err = fixture
            .session()
            .register(registration("1001", Role::Patient))
            .await
            .expect_err("duplicate registration must fail");
        assert!(matches!(err, PortalError::Auth(AuthError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn failed_profile_write_is_a_provisioning_error() {
        let fixture = Fixture::new();
        let flaky = Arc::new(FlakyStore::new(fixture.store.clone()));
        flaky.fail_sets(true);
        let session = Session::new(
            fixture.cfg.clone(),
            Arc::new(fixture.directory.client()),
            flaky.clone(),
        );

        let err = session
            .register(registration("1001", Role::Patient))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Auth(AuthError::Provisioning(_))));
        assert_eq!(session.current_account(), None);
        assert_eq!(fixture.store.len(Collection::Users).await, 0);

        flaky.fail_sets(false);
        let err = fixture
            .session()
            .login(&InsuranceNumber::parse("1001").unwrap(), "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Auth(AuthError::ProfileMissing(_))));

        let account = session
            .register(registration("1002", Role::Patient))
            .await
            .unwrap();
        assert_eq!(session.current_account(), Some(account));
    }

    #[tokio::test]
    async fn register_with_short_password_fails() {
        let fixture = Fixture::new();
        let mut reg = registration("1001", Role::Patient);
        reg.password = "abc".into();

        let err = fixture.session().register(reg).await.unwrap_err();
        assert!(matches!(
            err,
            PortalError::Auth(AuthError::WeakPassword { min: 6 })
        ));
    }

    #[tokio::test]
    async fn login_loads_profile() {
        let fixture = Fixture::new();
        let registered = fixture
            .session()
            .register(registration("2002", Role::Patient))
            .await
            .unwrap();

        let session = fixture.session();
        let account = session
            .login(&InsuranceNumber::parse("2002").unwrap(), "secret1")
            .await
            .expect("login should succeed");
        assert_eq!(account, registered);
        assert_eq!(session.state(), SessionState::Authenticated(registered));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let fixture = Fixture::new();
        fixture
            .session()
            .register(registration("2002", Role::Patient))
            .await
            .unwrap();

        let err = fixture
            .session()
            .login(&InsuranceNumber::parse("2002").unwrap(), "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn login_without_profile_reports_missing_profile() {
        let fixture = Fixture::new();
        let client = fixture.directory.client();
        let orphan = client
            .create_account("3003@medportal.com", "secret1")
            .await
            .unwrap();

        let session = fixture.session();
        let err = session
            .login(&InsuranceNumber::parse("3003").unwrap(), "secret1")
            .await
            .expect_err("an unprovisioned account must not sign in");
        assert!(matches!(
            err,
            PortalError::Auth(AuthError::ProfileMissing(ref id)) if *id == orphan
        ));
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn logout_clears_state_even_when_provider_is_down() {
        let fixture = Fixture::new();
        let session = fixture.session();
        session
            .register(registration("4004", Role::Doctor))
            .await
            .unwrap();

        fixture.directory.set_offline(true);
        let result = session.logout().await;

        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn rehydrate_settles_anonymous_for_signed_out_client() {
        let fixture = Fixture::new();
        let session = Arc::new(fixture.session());
        let token = LivenessToken::new();
        let handle = session.spawn_rehydrate(token.clone());

        let settled = tokio::time::timeout(Duration::from_secs(1), session.ready())
            .await
            .expect("session should leave Loading");
        assert_eq!(settled, SessionState::Anonymous);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn rehydrate_restores_persisted_sign_in() {
        let fixture = Fixture::new();
        let account = fixture
            .session()
            .register(registration("5005", Role::Patient))
            .await
            .unwrap();

        let session = Arc::new(Session::new(
            fixture.cfg.clone(),
            Arc::new(fixture.directory.resume(account.id.clone())),
            fixture.store.clone(),
        ));
        let token = LivenessToken::new();
        let handle = session.spawn_rehydrate(token.clone());

        let settled = tokio::time::timeout(Duration::from_secs(1), session.ready())
            .await
            .unwrap();
        assert_eq!(settled, SessionState::Authenticated(account));

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn rehydrate_follows_logout() {
        let fixture = Fixture::new();
        let account = fixture
            .session()
            .register(registration("6006", Role::Doctor))
            .await
            .unwrap();

        let session = Arc::new(Session::new(
            fixture.cfg.clone(),
            Arc::new(fixture.directory.resume(account.id.clone())),
            fixture.store.clone(),
        ));
        let token = LivenessToken::new();
        let handle = session.spawn_rehydrate(token.clone());
        session.ready().await;

        let mut rx = session.subscribe();
        session.logout().await.unwrap();
        let state = tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|s| *s == SessionState::Anonymous),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state, SessionState::Anonymous);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn rehydrate_with_unprovisioned_account_is_anonymous() {
        let fixture = Fixture::new();
        let session = Arc::new(Session::new(
            fixture.cfg.clone(),
            Arc::new(fixture.directory.resume(DocumentId::generate())),
            fixture.store.clone(),
        ));
        let token = LivenessToken::new();
        let handle = session.spawn_rehydrate(token.clone());

        let settled = tokio::time::timeout(Duration::from_secs(1), session.ready())
            .await
            .unwrap();
        assert_eq!(settled, SessionState::Anonymous);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_rehydrate_leaves_state_untouched() {
        let fixture = Fixture::new();
        let session = Fixture::session(&fixture);
        let token = LivenessToken::new();
        token.cancel();

        session.rehydrate(&token).await;
        assert_eq!(session.state(), SessionState::Loading);
    }
}
