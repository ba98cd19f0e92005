//! Identity collaborator.
//!
//! The portal never stores credentials itself. Accounts live with an external identity
//! provider that hands out opaque account ids and tracks whether the current client is
//! signed in. One [`IdentityProvider`] value represents one client's view of the provider:
//! it owns that client's sign-in state and broadcasts every change to subscribers, including
//! the state it started with.

mod memory;

pub use memory::{MemoryIdentityClient, MemoryIdentityDirectory};

use crate::error::AuthError;
use crate::ids::AccountId;
use async_trait::async_trait;
use tokio::sync::watch;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("login id already in use")]
    LoginIdInUse,
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("invalid login id or password")]
    InvalidCredentials,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::LoginIdInUse => AuthError::AlreadyRegistered,
            IdentityError::WeakPassword { min } => AuthError::WeakPassword { min },
            IdentityError::InvalidCredentials => AuthError::InvalidCredentials,
            IdentityError::Unavailable(detail) => AuthError::Provider(detail),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an account and signs this client into it.
    async fn create_account(&self, login_id: &str, password: &str) -> IdentityResult<AccountId>;

    /// Signs this client into an existing account.
    async fn authenticate(&self, login_id: &str, password: &str) -> IdentityResult<AccountId>;

    /// Signs this client out.
    async fn end_session(&self) -> IdentityResult<()>;

    /// Subscribes to sign-in changes.
    ///
    /// The receiver's current value is the state at subscription time and counts as the
    /// first notification.
    fn subscribe(&self) -> watch::Receiver<Option<AccountId>>;
}
