use super::{IdentityError, IdentityProvider, IdentityResult};
use crate::ids::{AccountId, DocumentId};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

struct Credential {
    account_id: AccountId,
    salt: [u8; 16],
    digest: String,
}

fn digest(salt: &[u8; 16], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// In-process account directory shared by every [`MemoryIdentityClient`].
///
/// Login ids are compared case-insensitively. Passwords are kept as salted SHA-256 digests.
pub struct MemoryIdentityDirectory {
    accounts: RwLock<HashMap<String, Credential>>,
    min_password_len: usize,
    offline: AtomicBool,
}

impl MemoryIdentityDirectory {
    pub fn new(min_password_len: usize) -> Arc<Self> {
        Arc::new(Self {
            accounts: RwLock::new(HashMap::new()),
            min_password_len,
            offline: AtomicBool::new(false),
        })
    }

    /// A new client that starts signed out.
    pub fn client(self: &Arc<Self>) -> MemoryIdentityClient {
        MemoryIdentityClient::new(self.clone(), None)
    }

    /// A new client that starts signed in to `account_id`, as after a page reload with a
    /// persisted session.
    pub fn resume(self: &Arc<Self>, account_id: AccountId) -> MemoryIdentityClient {
        MemoryIdentityClient::new(self.clone(), Some(account_id))
    }

    /// Simulates the provider becoming unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    fn ensure_online(&self) -> IdentityResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("network request failed".into()));
        }
        Ok(())
    }

    async fn create(&self, login_id: &str, password: &str) -> IdentityResult<AccountId> {
        self.ensure_online()?;

        if password.chars().count() < self.min_password_len {
            return Err(IdentityError::WeakPassword {
                min: self.min_password_len,
            });
        }

        let key = login_id.to_ascii_lowercase();
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(IdentityError::LoginIdInUse);
        }

        let salt: [u8; 16] = rand::random();
        let account_id = DocumentId::generate();
        accounts.insert(
            key,
            Credential {
                account_id: account_id.clone(),
                salt,
                digest: digest(&salt, password),
            },
        );

        tracing::info!(%account_id, "identity account created");
        Ok(account_id)
    }

    async fn verify(&self, login_id: &str, password: &str) -> IdentityResult<AccountId> {
        self.ensure_online()?;

        let accounts = self.accounts.read().await;
        let credential = accounts
            .get(&login_id.to_ascii_lowercase())
            .ok_or(IdentityError::InvalidCredentials)?;

        if digest(&credential.salt, password) != credential.digest {
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(credential.account_id.clone())
    }
}

/// One client's signed-in state against a [`MemoryIdentityDirectory`].
pub struct MemoryIdentityClient {
    directory: Arc<MemoryIdentityDirectory>,
    current: watch::Sender<Option<AccountId>>,
}

impl MemoryIdentityClient {
    fn new(directory: Arc<MemoryIdentityDirectory>, initial: Option<AccountId>) -> Self {
        let (current, _) = watch::channel(initial);
        Self { directory, current }
    }

    pub fn current_account(&self) -> Option<AccountId> {
        self.current.borrow().clone()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityClient {
    async fn create_account(&self, login_id: &str, password: &str) -> IdentityResult<AccountId> {
        let account_id = self.directory.create(login_id, password).await?;
        self.current.send_replace(Some(account_id.clone()));
        Ok(account_id)
    }

    async fn authenticate(&self, login_id: &str, password: &str) -> IdentityResult<AccountId> {
        let account_id = self.directory.verify(login_id, password).await?;
        self.current.send_replace(Some(account_id.clone()));
        Ok(account_id)
    }

    async fn end_session(&self) -> IdentityResult<()> {
        self.directory.ensure_online()?;
        self.current.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<AccountId>> {
        self.current.subscribe()
    }
}
