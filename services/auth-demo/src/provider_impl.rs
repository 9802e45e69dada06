//! Concrete collaborators for the session coordinator.
//!
//! `OidcCredentialStore` keeps the session in a credential file and talks to
//! the token and userinfo endpoints. `ConsoleSignIn` is the browser step for
//! a terminal: it prints the authorization URL and reads back the redirect
//! the user pastes.

use std::future::Future;
use std::pin::Pin;

use oidc_auth::{ClientConfig, Credential, CredentialFile, Endpoints, TokenSet, UserInfo};
use provider::{BrowserSignIn, CredentialStore, ProviderError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File-backed session store using the identity provider's token endpoint
/// for refresh.
pub struct OidcCredentialStore {
    file: CredentialFile,
    client: reqwest::Client,
    endpoints: Endpoints,
    config: ClientConfig,
}

impl OidcCredentialStore {
    pub fn new(
        file: CredentialFile,
        client: reqwest::Client,
        endpoints: Endpoints,
        config: ClientConfig,
    ) -> Self {
        Self {
            file,
            client,
            endpoints,
            config,
        }
    }
}

impl CredentialStore for OidcCredentialStore {
    fn current(
        &self,
    ) -> Pin<Box<dyn Future<Output = provider::Result<Option<Credential>>> + Send + '_>> {
        Box::pin(async move { Ok(self.file.get().await) })
    }

    fn store(
        &self,
        tokens: TokenSet,
    ) -> Pin<Box<dyn Future<Output = provider::Result<Credential>> + Send + '_>> {
        Box::pin(async move {
            let credential = Credential::new(tokens, oidc_auth::now_millis());
            self.file.replace(credential.clone()).await?;
            info!(
                path = %self.file.path().display(),
                expires_at = credential.expires_at,
                "session stored"
            );
            Ok(credential)
        })
    }

    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = provider::Result<Credential>> + Send + 'a>> {
        Box::pin(async move {
            let Some(refresh) = credential.refresh_token() else {
                return Err(ProviderError::Refresh(
                    "session has no refresh token, sign in again".into(),
                ));
            };
            let tokens =
                oidc_auth::refresh_token(&self.client, &self.endpoints, &self.config, refresh)
                    .await?;
            let refreshed = credential.clone().refreshed(tokens, oidc_auth::now_millis());
            self.file.replace(refreshed.clone()).await?;
            Ok(refreshed)
        })
    }

    fn remove<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = provider::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let removed = self.file.clear().await?.is_some();
            debug!(removed, "session removed");
            Ok(())
        })
    }

    fn fetch_user_info<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = provider::Result<UserInfo>> + Send + 'a>> {
        Box::pin(async move {
            let info = oidc_auth::fetch_user_info(
                &self.client,
                &self.endpoints.userinfo_endpoint,
                credential.access_token(),
            )
            .await?;
            Ok(info)
        })
    }
}

/// Sign-in through the system browser, with the terminal as the redirect
/// target: the user opens the printed URL and pastes the redirect back.
pub struct ConsoleSignIn<R> {
    input: Mutex<R>,
    client: reqwest::Client,
    endpoints: Endpoints,
    config: ClientConfig,
    ephemeral: bool,
}

impl<R> ConsoleSignIn<R> {
    pub fn new(
        input: R,
        client: reqwest::Client,
        endpoints: Endpoints,
        config: ClientConfig,
        ephemeral: bool,
    ) -> Self {
        Self {
            input: Mutex::new(input),
            client,
            endpoints,
            config,
            ephemeral,
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> BrowserSignIn for ConsoleSignIn<R> {
    fn sign_in(&self) -> Pin<Box<dyn Future<Output = provider::Result<TokenSet>> + Send + '_>> {
        Box::pin(async move {
            let verifier = oidc_auth::generate_verifier();
            let challenge = oidc_auth::compute_challenge(&verifier);
            let state = oidc_auth::generate_state();
            let url = oidc_auth::build_authorization_url(
                &self.endpoints,
                &self.config,
                &state,
                &challenge,
                self.ephemeral,
            )?;

            eprintln!("Open this URL in your browser to sign in:\n\n  {url}\n");
            eprintln!("Then paste the redirect URL (or code) here, or press Enter to cancel:");

            let mut line = String::new();
            let read = self
                .input
                .lock()
                .await
                .read_line(&mut line)
                .await
                .map_err(|e| {
                    warn!(error = %e, "could not read the callback from input");
                    ProviderError::UserCancelled
                })?;
            if read == 0 || line.trim().is_empty() {
                info!("sign-in cancelled at the prompt");
                return Err(ProviderError::UserCancelled);
            }

            let code = oidc_auth::parse_callback(&line, &state)?;
            let tokens = oidc_auth::exchange_code(
                &self.client,
                &self.endpoints,
                &self.config,
                &code,
                &verifier,
            )
            .await?;
            debug!(
                has_refresh_token = tokens.refresh_token.is_some(),
                has_id_token = tokens.id_token.is_some(),
                "authorization code exchanged"
            );
            Ok(tokens)
        })
    }

    /// Revoke the session's tokens and point the user at the end-session
    /// URL so the browser session ends too.
    fn sign_out<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = provider::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut first_error = None;

            let mut revoke = vec![(credential.access_token(), "access_token")];
            if let Some(refresh) = credential.refresh_token() {
                revoke.insert(0, (refresh, "refresh_token"));
            }
            for (token, hint) in revoke {
                if let Err(e) = oidc_auth::revoke_token(
                    &self.client,
                    &self.endpoints,
                    &self.config,
                    token,
                    hint,
                )
                .await
                {
                    warn!(token_type_hint = hint, error = %e, "revocation failed");
                    first_error.get_or_insert(e);
                }
            }

            if let Some(id_token) = credential.id_token() {
                let state = oidc_auth::generate_state();
                if let Some(url) = oidc_auth::build_end_session_url(
                    &self.endpoints,
                    &self.config,
                    id_token,
                    &state,
                )? {
                    eprintln!("To end the browser session too, open:\n\n  {url}\n");
                }
            }

            match first_error {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        })
    }

    fn ephemeral_session(&self) -> bool {
        self.ephemeral
    }
}
