//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables while
//! handling a request.

use crate::constants::{DEFAULT_LOGIN_DOMAIN, DEFAULT_MIN_PASSWORD_LEN};
use crate::validation::validate_login_domain;
use crate::{PortalError, PortalResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    login_domain: String,
    min_password_len: usize,
    validate_selections: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::Validation` if `login_domain` is not a plausible DNS name or
    /// `min_password_len` is zero.
    pub fn new(
        login_domain: String,
        min_password_len: usize,
        validate_selections: bool,
    ) -> PortalResult<Self> {
        validate_login_domain(&login_domain)?;

        if min_password_len == 0 {
            return Err(PortalError::Validation(
                "minimum password length must be at least 1".into(),
            ));
        }

        Ok(Self {
            login_domain,
            min_password_len,
            validate_selections,
        })
    }

    /// Domain appended to insurance numbers to form login ids.
    pub fn login_domain(&self) -> &str {
        &self.login_domain
    }

    pub fn min_password_len(&self) -> usize {
        self.min_password_len
    }

    /// Whether diagnosis submissions are re-checked against the stored template before write.
    pub fn validate_selections(&self) -> bool {
        self.validate_selections
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            login_domain: DEFAULT_LOGIN_DOMAIN.to_owned(),
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
            validate_selections: true,
        }
    }
}

/// Parse the minimum password length from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_MIN_PASSWORD_LEN`].
pub fn min_password_len_from_env_value(value: Option<String>) -> PortalResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_MIN_PASSWORD_LEN),
        Some(v) => v.parse::<usize>().map_err(|_| {
            PortalError::Validation(format!("invalid minimum password length: {v}"))
        }),
    }
}

/// Resolve the login domain from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_LOGIN_DOMAIN`]. The result is
/// validated by [`CoreConfig::new`], not here.
pub fn login_domain_from_env_value(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_LOGIN_DOMAIN.to_owned())
}

/// Parse a positive number of seconds from an optional string value, falling back to
/// `default`.
pub fn seconds_from_env_value(value: Option<String>, default: u64) -> PortalResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(PortalError::Validation(format!(
                "invalid number of seconds: {v}"
            ))),
        },
    }
}

/// Parse a boolean switch from an optional string value, falling back to `default`.
pub fn flag_from_env_value(value: Option<String>, default: bool) -> PortalResult<bool> {
    let Some(raw) = value else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PortalError::Validation(format!(
            "invalid boolean value: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_portal_domain() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.login_domain(), "medportal.com");
        assert_eq!(cfg.min_password_len(), 6);
        assert!(cfg.validate_selections());
    }

    #[test]
    fn new_rejects_bad_domain_and_zero_length() {
        assert!(CoreConfig::new("not a domain".into(), 6, true).is_err());
        assert!(CoreConfig::new("clinic.example".into(), 0, true).is_err());
        assert!(CoreConfig::new("clinic.example".into(), 8, false).is_ok());
    }

    #[test]
    fn min_password_len_parsing() {
        assert_eq!(min_password_len_from_env_value(None).unwrap(), 6);
        assert_eq!(min_password_len_from_env_value(Some(" ".into())).unwrap(), 6);
        assert_eq!(min_password_len_from_env_value(Some("10".into())).unwrap(), 10);
        assert!(min_password_len_from_env_value(Some("ten".into())).is_err());
    }

    #[test]
    fn login_domain_falls_back_to_default() {
        assert_eq!(login_domain_from_env_value(None), "medportal.com");
        assert_eq!(login_domain_from_env_value(Some("  ".into())), "medportal.com");
        assert_eq!(
            login_domain_from_env_value(Some(" clinic.example ".into())),
            "clinic.example"
        );
    }

    #[test]
    fn seconds_parsing() {
        assert_eq!(seconds_from_env_value(None, 90).unwrap(), 90);
        assert_eq!(seconds_from_env_value(Some(" 15 ".into()), 90).unwrap(), 15);
        assert!(seconds_from_env_value(Some("0".into()), 90).is_err());
        assert!(seconds_from_env_value(Some("soon".into()), 90).is_err());
    }

    #[test]
    fn flag_parsing() {
        assert!(flag_from_env_value(None, true).unwrap());
        assert!(!flag_from_env_value(Some("off".into()), true).unwrap());
        assert!(flag_from_env_value(Some("YES".into()), false).unwrap());
        assert!(flag_from_env_value(Some("maybe".into()), false).is_err());
    }
}
