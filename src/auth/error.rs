//! Authentication error types.

use thiserror::Error;

/// Reasons a credential was not accepted.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is not a structurally valid JWT.
    #[error("invalid token format: {0}")]
    Malformed(String),

    /// The signature does not verify against the configured key.
    #[error("token signature verification failed")]
    InvalidSignature,

    /// The token's `exp` claim is in the past.
    #[error("token has expired")]
    Expired,

    /// Neither `sub` nor `userId` is present.
    #[error("token carries no identity claim")]
    MissingIdentity,

    /// The authenticator did not answer within the handshake deadline.
    #[error("authentication timed out after {0} ms")]
    Timeout(u64),

    /// Any other rejection from `jsonwebtoken`.
    #[error("JWT error: {0}")]
    Jwt(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::Malformed(err.to_string())
            }
            _ => AuthError::Jwt(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        assert_eq!(AuthError::Expired.to_string(), "token has expired");
        assert_eq!(
            AuthError::Timeout(250).to_string(),
            "authentication timed out after 250 ms"
        );
    }

    #[test]
    fn test_jwt_error_kinds_are_classified() {
        use jsonwebtoken::errors::{Error, ErrorKind};
        assert!(matches!(
            AuthError::from(Error::from(ErrorKind::ExpiredSignature)),
            AuthError::Expired
        ));
        assert!(matches!(
            AuthError::from(Error::from(ErrorKind::InvalidSignature)),
            AuthError::InvalidSignature
        ));
        assert!(matches!(
            AuthError::from(Error::from(ErrorKind::InvalidToken)),
            AuthError::Malformed(_)
        ));
    }
}
