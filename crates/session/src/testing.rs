//! Fakes for the provider traits and a throwaway backend server

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use oidc_auth::{Credential, TokenSet, UserInfo};
use provider::{BrowserSignIn, CredentialStore, ProviderError, Result};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::coordinator::AuthCoordinator;

pub(crate) const ISSUER: &str = "https://dev-1.okta.com/oauth2/default";

/// Nothing listens on port 1; requests fail fast with connection refused.
pub(crate) const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:1/api/messages";

pub(crate) fn id_token(username: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "iss": ISSUER,
            "sub": "00u1",
            "preferred_username": username,
            "iat": 1_700_000_000,
            "auth_time": 1_699_999_990,
        })
        .to_string(),
    );
    format!("{header}.{payload}.c2ln")
}

/// Token set number `n` as issued by the fake browser.
pub(crate) fn tokens(n: usize) -> TokenSet {
    TokenSet {
        token_type: "Bearer".into(),
        access_token: format!("at_{n}"),
        refresh_token: Some(format!("rt_{n}")),
        id_token: Some(id_token(&format!("user{n}@example.com"))),
        expires_in: Some(3600),
        scope: Some("openid profile offline_access".into()),
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub persisted: Mutex<Option<Credential>>,
    pub fail_store: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub fail_remove: AtomicBool,
    pub fail_user_info: AtomicBool,
    pub refreshes: AtomicUsize,
    pub user_info_fetches: AtomicUsize,
}

impl FakeStore {
    pub fn with_session(credential: Credential) -> Self {
        let store = Self::default();
        *store.persisted.lock().unwrap() = Some(credential);
        store
    }

    pub fn persisted(&self) -> Option<Credential> {
        self.persisted.lock().unwrap().clone()
    }
}

impl CredentialStore for FakeStore {
    fn current(&self) -> Pin<Box<dyn Future<Output = Result<Option<Credential>>> + Send + '_>> {
        Box::pin(async move { Ok(self.persisted()) })
    }

    fn store(
        &self,
        tokens: TokenSet,
    ) -> Pin<Box<dyn Future<Output = Result<Credential>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_store.load(Ordering::SeqCst) {
                return Err(ProviderError::Storage("disk full".into()));
            }
            let credential = Credential::new(tokens, 0);
            *self.persisted.lock().unwrap() = Some(credential.clone());
            Ok(credential)
        })
    }

    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<Credential>> + Send + 'a>> {
        Box::pin(async move {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_refresh.load(Ordering::SeqCst) {
                return Err(ProviderError::Network("token endpoint unreachable".into()));
            }
            let response = TokenSet {
                access_token: format!("{}_r{n}", credential.access_token()),
                refresh_token: None,
                id_token: None,
                ..credential.token.clone()
            };
            let refreshed = credential.clone().refreshed(response, 0);
            *self.persisted.lock().unwrap() = Some(refreshed.clone());
            Ok(refreshed)
        })
    }

    fn remove<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err(ProviderError::Storage("permission denied".into()));
            }
            self.persisted.lock().unwrap().take();
            Ok(())
        })
    }

    fn fetch_user_info<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<UserInfo>> + Send + 'a>> {
        Box::pin(async move {
            self.user_info_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_user_info.load(Ordering::SeqCst) {
                return Err(ProviderError::Network("userinfo endpoint unreachable".into()));
            }
            Ok(UserInfo {
                sub: Some("00u1".into()),
                name: Some("Ada Lovelace".into()),
                preferred_username: Some("ada@example.com".into()),
                ..UserInfo::default()
            })
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeBrowser {
    pub sign_ins: AtomicUsize,
    pub sign_outs: AtomicUsize,
    pub cancel: AtomicBool,
    pub fail_sign_out: AtomicBool,
    /// When set, sign-in waits for a permit before completing.
    pub gate: Option<Arc<Notify>>,
}

impl FakeBrowser {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }
}

impl BrowserSignIn for FakeBrowser {
    fn sign_in(&self) -> Pin<Box<dyn Future<Output = Result<TokenSet>> + Send + '_>> {
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.cancel.load(Ordering::SeqCst) {
                return Err(ProviderError::UserCancelled);
            }
            let n = self.sign_ins.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(tokens(n))
        })
    }

    fn sign_out<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            if self.fail_sign_out.load(Ordering::SeqCst) {
                return Err(ProviderError::Network("end-session endpoint unreachable".into()));
            }
            Ok(())
        })
    }

    fn ephemeral_session(&self) -> bool {
        true
    }
}

pub(crate) fn coordinator(
    store: Arc<FakeStore>,
    browser: Arc<FakeBrowser>,
    messages_url: &str,
) -> Arc<AuthCoordinator> {
    Arc::new(AuthCoordinator::new(
        store,
        browser,
        reqwest::Client::new(),
        messages_url,
    ))
}

/// Mock resource server answering `GET /api/messages` with a fixed reply.
pub(crate) struct Backend {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    pub last_authorization: Arc<Mutex<Option<String>>>,
}

pub(crate) async fn start_backend(status: StatusCode, body: &'static str) -> Backend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/messages", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let last_authorization = Arc::new(Mutex::new(None));

    let handler_hits = hits.clone();
    let handler_auth = last_authorization.clone();
    tokio::spawn(async move {
        let app = axum::Router::new().route(
            "/api/messages",
            axum::routing::get(move |headers: HeaderMap| {
                let hits = handler_hits.clone();
                let auth = handler_auth.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    *auth.lock().unwrap() = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    (
                        status,
                        [(axum::http::header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                }
            }),
        );
        axum::serve(listener, app).await.unwrap();
    });

    Backend {
        url,
        hits,
        last_authorization,
    }
}
