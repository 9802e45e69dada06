//! Error types for session operations

use provider::ProviderError;

/// Failures surfaced to the presentation layer.
///
/// The `Display` text is what the user sees; the presentation layer does
/// not distinguish variants.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Sign-in was cancelled.")]
    UserCancelled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not save the session: {0}")]
    Storage(String),

    #[error("Session refresh failed: {0}")]
    Refresh(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, AuthError>;

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UserCancelled => AuthError::UserCancelled,
            ProviderError::Network(msg) => AuthError::Network(msg),
            ProviderError::Storage(msg) => AuthError::Storage(msg),
            ProviderError::Refresh(msg) => AuthError::Refresh(msg),
            ProviderError::Decode(msg) => AuthError::Decode(msg),
        }
    }
}
