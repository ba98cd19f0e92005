//! Bearer tokens.
//!
//! Clients authenticate with `Authorization: Bearer <token>`, where the token is the random
//! UUID handed out on login or registration.

use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("missing Authorization header")]
    Missing,
    #[error("Authorization header is not a bearer token")]
    NotBearer,
    #[error("malformed bearer token")]
    Malformed,
}

/// Issues a fresh session token.
pub fn issue_token() -> Uuid {
    Uuid::new_v4()
}

/// Parses the value of an `Authorization` header into a session token.
pub fn parse_bearer(header: Option<&str>) -> Result<Uuid, TokenError> {
    let header = header.ok_or(TokenError::Missing)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(TokenError::NotBearer)?;
    Uuid::parse_str(token.trim()).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issued_token() {
        let token = issue_token();
        let header = format!("Bearer {token}");
        assert_eq!(parse_bearer(Some(&header)), Ok(token));
    }

    #[test]
    fn rejects_missing_and_foreign_schemes() {
        assert_eq!(parse_bearer(None), Err(TokenError::Missing));
        assert_eq!(
            parse_bearer(Some("Basic dXNlcjpwYXNz")),
            Err(TokenError::NotBearer)
        );
        assert_eq!(
            parse_bearer(Some("Bearer not-a-token")),
            Err(TokenError::Malformed)
        );
    }
}
