//! Collaborator interfaces for the session coordinator
//!
//! The coordinator never talks to an identity provider or a credential
//! store directly. It goes through these two traits, which the demo binary
//! implements on top of `oidc-auth` and tests implement with fakes:
//! - `CredentialStore` persists the one session credential and performs the
//!   token operations that need it (refresh, user info, request
//!   authorization)
//! - `BrowserSignIn` runs the interactive sign-in/sign-out flow
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn CredentialStore>`).

use std::future::Future;
use std::pin::Pin;

use oidc_auth::{Credential, TokenSet, UserInfo};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

/// Errors from collaborator operations, grouped by how the caller reacts.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("sign-in was cancelled")]
    UserCancelled,

    #[error("network error: {0}")]
    Network(String),

    #[error("credential storage failed: {0}")]
    Storage(String),

    #[error("token refresh rejected: {0}")]
    Refresh(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<oidc_auth::Error> for ProviderError {
    fn from(err: oidc_auth::Error) -> Self {
        use oidc_auth::Error;
        match err {
            Error::AccessDenied(_) => ProviderError::UserCancelled,
            Error::InvalidCredentials(msg) => ProviderError::Refresh(msg),
            Error::Io(msg) | Error::CredentialParse(msg) => ProviderError::Storage(msg),
            Error::IdToken(msg) | Error::InvalidResponse(msg) | Error::Callback(msg) => {
                ProviderError::Decode(msg)
            }
            Error::Http(msg) | Error::TokenExchange(msg) => ProviderError::Network(msg),
        }
    }
}

/// Persistence and token operations for the single session credential.
pub trait CredentialStore: Send + Sync {
    /// The persisted credential, if a previous run left one.
    fn current(&self) -> Pin<Box<dyn Future<Output = Result<Option<Credential>>> + Send + '_>>;

    /// Persist a freshly issued token set as the session credential,
    /// replacing any prior one.
    fn store(
        &self,
        tokens: TokenSet,
    ) -> Pin<Box<dyn Future<Output = Result<Credential>> + Send + '_>>;

    /// Refresh the token set and persist the result.
    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<Credential>> + Send + 'a>>;

    /// Delete the persisted credential.
    fn remove<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Fetch the user's profile from the identity provider.
    fn fetch_user_info<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<UserInfo>> + Send + 'a>>;

    /// Add the credential's authorization to an outgoing request.
    fn authorize(&self, credential: &Credential, headers: &mut HeaderMap) -> Result<()> {
        let value = HeaderValue::from_str(&format!("Bearer {}", credential.access_token()))
            .map_err(|e| ProviderError::Decode(format!("invalid access token value: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// Interactive browser sign-in, delegated to whatever drives the browser.
pub trait BrowserSignIn: Send + Sync {
    /// Run the sign-in flow. `UserCancelled` when the user backs out.
    fn sign_in(&self) -> Pin<Box<dyn Future<Output = Result<TokenSet>> + Send + '_>>;

    /// Tell the identity provider the session is over.
    fn sign_out<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Whether sign-in avoids reusing persisted browser state.
    fn ephemeral_session(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct NullStore;

    impl CredentialStore for NullStore {
        fn current(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Credential>>> + Send + '_>> {
            Box::pin(async { Ok(None) })
        }

        fn store(
            &self,
            tokens: TokenSet,
        ) -> Pin<Box<dyn Future<Output = Result<Credential>> + Send + '_>> {
            Box::pin(async move { Ok(Credential::new(tokens, 0)) })
        }

        fn refresh<'a>(
            &'a self,
            _credential: &'a Credential,
        ) -> Pin<Box<dyn Future<Output = Result<Credential>> + Send + 'a>> {
            Box::pin(async { Err(ProviderError::Refresh("no refresh token".into())) })
        }

        fn remove<'a>(
            &'a self,
            _credential: &'a Credential,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }

        fn fetch_user_info<'a>(
            &'a self,
            _credential: &'a Credential,
        ) -> Pin<Box<dyn Future<Output = Result<UserInfo>> + Send + 'a>> {
            Box::pin(async { Ok(UserInfo::default()) })
        }
    }

    fn tokens(access: &str) -> TokenSet {
        TokenSet {
            token_type: "Bearer".into(),
            access_token: access.into(),
            refresh_token: None,
            id_token: None,
            expires_in: None,
            scope: None,
        }
    }

    #[tokio::test]
    async fn store_is_dyn_compatible() {
        let store: Arc<dyn CredentialStore> = Arc::new(NullStore);
        assert!(store.current().await.unwrap().is_none());
        let credential = store.store(tokens("at_1")).await.unwrap();
        assert_eq!(credential.access_token(), "at_1");
    }

    #[test]
    fn authorize_inserts_bearer_header() {
        let credential = Credential::new(tokens("at_abc"), 0);
        let mut headers = HeaderMap::new();
        NullStore.authorize(&credential, &mut headers).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer at_abc");
    }

    #[test]
    fn authorize_replaces_existing_header() {
        let credential = Credential::new(tokens("at_new"), 0);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        NullStore.authorize(&credential, &mut headers).unwrap();
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer at_new");
    }

    #[test]
    fn authorize_rejects_unprintable_token() {
        let credential = Credential::new(tokens("at\nbad"), 0);
        let mut headers = HeaderMap::new();
        let err = NullStore.authorize(&credential, &mut headers).unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn oidc_errors_map_to_provider_categories() {
        use oidc_auth::Error;
        assert!(matches!(
            ProviderError::from(Error::AccessDenied("cancel".into())),
            ProviderError::UserCancelled
        ));
        assert!(matches!(
            ProviderError::from(Error::InvalidCredentials("revoked".into())),
            ProviderError::Refresh(_)
        ));
        assert!(matches!(
            ProviderError::from(Error::Io("disk full".into())),
            ProviderError::Storage(_)
        ));
        assert!(matches!(
            ProviderError::from(Error::Http("timeout".into())),
            ProviderError::Network(_)
        ));
        assert!(matches!(
            ProviderError::from(Error::InvalidResponse("bad json".into())),
            ProviderError::Decode(_)
        ));
    }
}
