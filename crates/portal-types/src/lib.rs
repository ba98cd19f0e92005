//! Validated text primitives shared across the portal crates.
//!
//! Values of these types are checked once at construction so the rest of the workspace can
//! take them as already valid.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The insurance number contained characters outside the accepted set
    #[error("insurance number may only contain ASCII letters and digits")]
    InvalidInsuranceNumber,
    /// The insurance number exceeded the accepted length
    #[error("insurance number exceeds maximum length of {max} characters")]
    InsuranceNumberTooLong { max: usize },
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A national health insurance number (the patient's or clinician's OMS number).
///
/// Insurance numbers double as the local part of the identity provider's login id, so the
/// accepted alphabet is restricted to ASCII letters and digits. Two distinct insurance numbers
/// therefore always map to two distinct login ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsuranceNumber(String);

impl InsuranceNumber {
    /// Longest accepted insurance number.
    pub const MAX_LEN: usize = 32;

    /// Validates and wraps an insurance number.
    ///
    /// Surrounding whitespace is trimmed. The remaining input must be non-empty, at most
    /// [`InsuranceNumber::MAX_LEN`] characters and ASCII alphanumeric. Letters are stored
    /// upper-case: identity providers compare login ids case-insensitively, so `ab12` and
    /// `AB12` must be the same insurance number.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(TextError::InsuranceNumberTooLong { max: Self::MAX_LEN });
        }
        if !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TextError::InvalidInsuranceNumber);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the identity provider login id: `<number>@<domain>`.
    pub fn login_id(&self, domain: &str) -> String {
        format!("{}@{}", self.0, domain)
    }
}

impl std::fmt::Display for InsuranceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for InsuranceNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for InsuranceNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for InsuranceNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        InsuranceNumber::parse(&s).map_err(serde::de::Error::custom)
    }
}
