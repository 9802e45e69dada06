//! Error types for OIDC operations

/// Errors from OIDC operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid ID token: {0}")]
    IdToken(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid sign-in callback: {0}")]
    Callback(String),

    #[error("authorization denied: {0}")]
    AccessDenied(String),
}

/// Result alias for OIDC operations.
pub type Result<T> = std::result::Result<T, Error>;
