//! Input validation utilities.
//!
//! This module contains functions for validating inputs before they are handed to the
//! identity provider or written to the document store.

use crate::model::{DiagnosisSelection, DiagnosisTemplate};
use crate::{PortalError, PortalResult};

/// Validates that a login domain is safe to append to an insurance number.
///
/// The domain becomes the right-hand side of the identity provider login id
/// (`<insurance number>@<domain>`), so it must be a plain DNS-style name:
/// - non-empty and at most 253 characters
/// - ASCII alphanumerics, `.` and `-` only
/// - contains at least one `.` and does not start or end with one
///
/// # Errors
///
/// Returns a `PortalError::Validation` if the domain is invalid.
pub fn validate_login_domain(domain: &str) -> PortalResult<()> {
    const MAX_DOMAIN_LEN: usize = 253;

    if domain.trim().is_empty() {
        return Err(PortalError::Validation("login domain cannot be empty".into()));
    }

    if domain.len() > MAX_DOMAIN_LEN {
        return Err(PortalError::Validation(format!(
            "login domain exceeds maximum length of {} characters",
            MAX_DOMAIN_LEN
        )));
    }

    let ok = domain
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-'));

    if !ok {
        return Err(PortalError::Validation(
            "login domain contains invalid characters (only alphanumeric, '.', '-' allowed)"
                .into(),
        ));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(PortalError::Validation(
            "login domain must be a dotted name such as medportal.com".into(),
        ));
    }

    Ok(())
}

/// Checks a diagnosis selection against the template it references.
///
/// Every selected symptom and diagnostic method must name an entry of the template, and the
/// selected treatment must name exactly one of its treatments.
///
/// # Errors
///
/// Returns `PortalError::Validation` naming the first selection that does not belong.
pub fn validate_selection(
    template: &DiagnosisTemplate,
    selection: &DiagnosisSelection,
) -> PortalResult<()> {
    if let Some(unknown) = selection
        .symptoms
        .iter()
        .find(|name| !template.has_symptom(name))
    {
        return Err(PortalError::Validation(format!(
            "symptom '{unknown}' is not part of template '{}'",
            template.body.name
        )));
    }

    if let Some(unknown) = selection
        .diagnostics
        .iter()
        .find(|name| !template.has_method(name))
    {
        return Err(PortalError::Validation(format!(
            "diagnostic method '{unknown}' is not part of template '{}'",
            template.body.name
        )));
    }

    if !template.has_treatment(&selection.treatment) {
        return Err(PortalError::Validation(format!(
            "treatment '{}' is not part of template '{}'",
            selection.treatment, template.body.name
        )));
    }

    Ok(())
}
