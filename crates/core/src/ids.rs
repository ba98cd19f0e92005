//! Document identifiers.
//!
//! Every document in the store is addressed by an opaque string id. Ids allocated by the
//! portal itself use the canonical form of a v4 UUID: **32 lowercase hexadecimal characters**
//! with no hyphens, the same value as `Uuid::new_v4().simple().to_string()`. Ids that arrive
//! from outside (identity provider account ids, path parameters) are accepted as long as they
//! are non-empty and contain no path separator, since the store addresses documents as
//! `<collection>/<id>`.

use crate::error::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a document within a collection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

/// Account ids are owned by the identity provider and mirrored as `users` document ids.
pub type AccountId = DocumentId;

impl DocumentId {
    const MAX_LEN: usize = 128;

    /// Allocates a fresh id in canonical form.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validates an externally supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Validation`] if the id is empty, longer than 128 characters or
    /// contains `/`.
    pub fn parse(input: &str) -> PortalResult<Self> {
        if input.trim().is_empty() {
            return Err(PortalError::Validation("document id cannot be empty".into()));
        }
        if input.len() > Self::MAX_LEN {
            return Err(PortalError::Validation(format!(
                "document id exceeds maximum length of {} characters",
                Self::MAX_LEN
            )));
        }
        if input.contains('/') {
            return Err(PortalError::Validation(
                "document id must not contain '/'".into(),
            ));
        }
        Ok(Self(input.to_owned()))
    }

    /// Returns true when this id has the canonical 32-hex form.
    pub fn is_canonical(&self) -> bool {
        self.0.len() == 32 && self.0.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = PortalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_canonical_and_unique() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert!(a.is_canonical());
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_provider_ids() {
        let id = DocumentId::parse("Xk29aPq0LmZ").expect("provider ids are opaque strings");
        assert_eq!(id.as_str(), "Xk29aPq0LmZ");
        assert!(!id.is_canonical());
    }

    #[test]
    fn parse_rejects_empty_and_path_like_ids() {
        assert!(matches!(
            DocumentId::parse("  "),
            Err(PortalError::Validation(_))
        ));
        assert!(matches!(
            DocumentId::parse("users/abc"),
            Err(PortalError::Validation(_))
        ));
    }

    #[test]
    fn deserialise_validates() {
        assert!(serde_json::from_str::<DocumentId>("\"\"").is_err());
        let id: DocumentId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.to_string(), "abc");
    }
}
