//! UI-bindable session state
//!
//! `PresentationState` turns user intents into coordinator calls and
//! publishes the outcome through a `watch` channel. While an intent is in
//! flight `loading` is set and further intents are ignored, the way a view
//! disables its controls. Failures land in `error` as display text until the
//! view dismisses them.

use std::sync::Arc;

use oidc_auth::{TokenInfo, UserInfo};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::coordinator::AuthCoordinator;
use crate::error::AuthError;

/// Snapshot of everything a view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub authenticated: bool,
    pub access_token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub server_message: Option<String>,
}

pub struct PresentationState {
    coordinator: Arc<AuthCoordinator>,
    view: watch::Sender<ViewState>,
}

/// Clears `loading` when the intent finishes, including when its future is
/// dropped mid-flight.
struct Loading<'a> {
    view: &'a watch::Sender<ViewState>,
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.view.send_modify(|v| v.loading = false);
    }
}

impl PresentationState {
    pub fn new(coordinator: Arc<AuthCoordinator>) -> Self {
        let view = watch::Sender::new(ViewState {
            authenticated: coordinator.is_authenticated(),
            access_token: coordinator.current_access_token(),
            ..ViewState::default()
        });
        Self { coordinator, view }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn coordinator(&self) -> &Arc<AuthCoordinator> {
        &self.coordinator
    }

    /// Set `loading` unless an intent already holds it.
    fn begin(&self, intent: &'static str) -> Option<Loading<'_>> {
        let started = self.view.send_if_modified(|v| {
            if v.loading {
                false
            } else {
                v.loading = true;
                true
            }
        });
        if !started {
            debug!(intent, "ignoring intent while another is in flight");
            return None;
        }
        Some(Loading { view: &self.view })
    }

    fn fail(&self, intent: &'static str, err: &AuthError) {
        warn!(intent, error = %err, "intent failed");
        self.view.send_modify(|v| v.error = Some(err.to_string()));
    }

    fn sync_session(&self) {
        let authenticated = self.coordinator.is_authenticated();
        let access_token = self.coordinator.current_access_token();
        self.view.send_modify(|v| {
            v.authenticated = authenticated;
            v.access_token = access_token;
        });
    }

    /// Sign out when signed in, otherwise sign in. The session fields are
    /// resynced whatever the outcome.
    pub async fn toggle_auth(&self) {
        let Some(_loading) = self.begin("toggle_auth") else {
            return;
        };
        let result = if self.coordinator.is_authenticated() {
            self.coordinator.sign_out().await
        } else {
            self.coordinator.sign_in().await
        };
        if let Err(e) = result {
            self.fail("toggle_auth", &e);
        }
        self.sync_session();
    }

    pub async fn refresh(&self) {
        let Some(_loading) = self.begin("refresh") else {
            return;
        };
        if let Err(e) = self.coordinator.refresh_if_needed().await {
            self.fail("refresh", &e);
        }
        self.sync_session();
    }

    /// Claims of the current ID token. Synchronous, so no loading state.
    pub fn fetch_token_info(&self) -> Option<TokenInfo> {
        self.coordinator.token_info()
    }

    pub async fn fetch_user_info(&self) -> Option<UserInfo> {
        let _loading = self.begin("fetch_user_info")?;
        match self.coordinator.fetch_user_info().await {
            Ok(info) => info,
            Err(e) => {
                self.fail("fetch_user_info", &e);
                None
            }
        }
    }

    /// Fetch a backend message into `server_message`.
    pub async fn fetch_message(&self) {
        let Some(_loading) = self.begin("fetch_message") else {
            return;
        };
        match self.coordinator.fetch_backend_message().await {
            Ok(text) => self.view.send_modify(|v| v.server_message = Some(text)),
            Err(e) => self.fail("fetch_message", &e),
        }
    }

    /// The view dismissed the error alert.
    pub fn clear_error(&self) {
        self.view.send_if_modified(|v| v.error.take().is_some());
    }
}
