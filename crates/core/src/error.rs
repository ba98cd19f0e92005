use crate::ids::{AccountId, DocumentId};
use crate::store::{Collection, StoreError};
use portal_types::TextError;

/// Failures of the session component.
///
/// A missing profile document after a successful authentication is reported as its own
/// variant so callers can tell a provisioning inconsistency apart from bad credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("an account is already registered for this insurance number")]
    AlreadyRegistered,
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("invalid insurance number or password")]
    InvalidCredentials,
    #[error("account {0} has no provisioned profile")]
    ProfileMissing(AccountId),
    #[error("not signed in")]
    NotSignedIn,
    #[error("identity provider unavailable: {0}")]
    Provider(String),
    #[error("failed to provision profile: {0}")]
    Provisioning(#[source] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid input: {0}")]
    InvalidText(#[from] TextError),
    #[error("failed to save: {0}")]
    Persistence(#[source] StoreError),
    #[error("failed to load: {0}")]
    Fetch(#[source] StoreError),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{collection} document {id} not found")]
    NotFound {
        collection: Collection,
        id: DocumentId,
    },
    #[error("malformed {collection} document {id}: {source}")]
    MalformedDocument {
        collection: Collection,
        id: DocumentId,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encoding(#[source] serde_json::Error),
}

impl PortalError {
    /// True for failures detected locally, before any collaborator call.
    pub fn is_validation(&self) -> bool {
        matches!(self, PortalError::Validation(_) | PortalError::InvalidText(_))
    }
}

pub type PortalResult<T> = std::result::Result<T, PortalError>;
