//! Session coordinator
//!
//! Owns the one session credential. Sign-in, sign-out, refresh and user-info
//! caching each hold the transition lock for their whole duration, so at
//! most one of them mutates the session at a time. The credential slot
//! itself sits behind a plain mutex that is never held across an await,
//! which keeps the read accessors synchronous.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use oidc_auth::{Credential, TokenInfo, UserInfo};
use provider::{BrowserSignIn, CredentialStore};
use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};
use crate::messages::{MessageResponse, NO_MESSAGES, NOT_AUTHENTICATED};

/// Where the session is in its lifecycle.
///
/// Transitions:
/// - SignedOut → SignedIn (sign-in)
/// - SignedIn → SignedIn (refresh, repeated sign-in)
/// - SignedIn → SignedOut (sign-out)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    SignedIn,
}

impl SessionState {
    /// Status label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::SignedOut => "signed_out",
            SessionState::SignedIn => "signed_in",
        }
    }
}

pub struct AuthCoordinator {
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserSignIn>,
    client: reqwest::Client,
    messages_url: String,
    session: Mutex<Option<Credential>>,
    transition: tokio::sync::Mutex<()>,
}

impl AuthCoordinator {
    /// Create a coordinator with an empty session slot.
    ///
    /// Call [`restore`](Self::restore) to pick up a credential persisted by
    /// an earlier run.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        browser: Arc<dyn BrowserSignIn>,
        client: reqwest::Client,
        messages_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            browser,
            client,
            messages_url: messages_url.into(),
            session: Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Credential>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn credential(&self) -> Option<Credential> {
        self.slot().clone()
    }

    /// Load the persisted credential into the session slot.
    ///
    /// Returns whether a session was restored.
    pub async fn restore(&self) -> Result<bool> {
        let _guard = self.transition.lock().await;
        let credential = self.store.current().await?;
        let restored = credential.is_some();
        *self.slot() = credential;
        info!(restored, "restored session");
        Ok(restored)
    }

    pub fn is_authenticated(&self) -> bool {
        self.slot().is_some()
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.slot().as_ref().map(|c| c.access_token().to_string())
    }

    pub fn session_state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::SignedIn
        } else {
            SessionState::SignedOut
        }
    }

    /// Run the browser sign-in and persist the resulting credential.
    ///
    /// A credential that cannot be persisted is not adopted; the slot keeps
    /// whatever it held before.
    pub async fn sign_in(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        let ephemeral = self.browser.ephemeral_session();
        debug!(ephemeral, "starting browser sign-in");

        let tokens = self.browser.sign_in().await.map_err(|e| {
            info!(error = %e, "browser sign-in did not complete");
            AuthError::from(e)
        })?;
        let credential = self.store.store(tokens).await?;

        let replaced = self.slot().replace(credential).is_some();
        info!(replaced, state = SessionState::SignedIn.label(), "signed in");
        Ok(())
    }

    /// End the session.
    ///
    /// The local credential is always removed, even when the identity
    /// provider could not be notified. A failed removal from the store is
    /// logged and otherwise ignored; a failed notification is returned once
    /// the session is gone locally.
    pub async fn sign_out(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        let Some(credential) = self.credential() else {
            debug!("sign-out without a session");
            return Ok(());
        };

        let notified = self.browser.sign_out(&credential).await;
        if let Err(e) = &notified {
            warn!(error = %e, "identity provider sign-out failed");
        }

        if let Err(e) = self.store.remove(&credential).await {
            warn!(error = %e, "failed to remove stored credential");
        }
        self.slot().take();
        info!(state = SessionState::SignedOut.label(), "signed out");

        notified.map_err(AuthError::from)
    }

    /// Refresh the session's token set.
    ///
    /// Refreshes whenever a session exists, regardless of expiry. Without a
    /// session this does nothing. On failure the current credential stays.
    pub async fn refresh_if_needed(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        let Some(credential) = self.credential() else {
            debug!("refresh without a session, skipping");
            return Ok(());
        };

        let refreshed = self.store.refresh(&credential).await.map_err(|e| {
            warn!(error = %e, "token refresh failed");
            AuthError::from(e)
        })?;
        let expires_at = refreshed.expires_at;
        *self.slot() = Some(refreshed);
        info!(expires_at, "refreshed session");
        Ok(())
    }

    /// Claims of the current ID token. No I/O.
    pub fn token_info(&self) -> Option<TokenInfo> {
        let slot = self.slot();
        let raw = slot.as_ref()?.id_token()?;
        match TokenInfo::from_id_token(raw) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!(error = %e, "id token is not decodable");
                None
            }
        }
    }

    /// The signed-in user's profile.
    ///
    /// Served from the credential when cached; otherwise fetched once and
    /// cached on the credential. A failed fetch is logged and reported as
    /// no profile.
    pub async fn fetch_user_info(&self) -> Result<Option<UserInfo>> {
        let _guard = self.transition.lock().await;
        let Some(credential) = self.credential() else {
            return Ok(None);
        };
        if let Some(cached) = &credential.user_info {
            debug!("serving cached user info");
            return Ok(Some(cached.clone()));
        }

        match self.store.fetch_user_info(&credential).await {
            Ok(info) => {
                if let Some(current) = self.slot().as_mut() {
                    current.user_info = Some(info.clone());
                }
                Ok(Some(info))
            }
            Err(e) => {
                warn!(error = %e, "user info fetch failed");
                Ok(None)
            }
        }
    }

    /// Call the backend with the session's access token and return the text
    /// of one message chosen at random.
    ///
    /// Without a session no request is made and [`NOT_AUTHENTICATED`] is
    /// returned.
    pub async fn fetch_backend_message(&self) -> Result<String> {
        let Some(credential) = self.credential() else {
            return Ok(NOT_AUTHENTICATED.to_string());
        };

        let mut headers = HeaderMap::new();
        self.store.authorize(&credential, &mut headers)?;

        let response = self
            .client
            .get(&self.messages_url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("backend request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "backend rejected message request");
            return Err(AuthError::Network(format!("backend returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(format!("reading backend response: {e}")))?;
        let payload: MessageResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Decode(format!("invalid message payload: {e}")))?;
        debug!(count = payload.messages.len(), "fetched messages");

        Ok(payload
            .pick_random()
            .map(|m| m.text.clone())
            .unwrap_or_else(|| NO_MESSAGES.to_string()))
    }
}
