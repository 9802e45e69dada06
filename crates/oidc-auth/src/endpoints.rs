//! Identity provider endpoints and public client configuration
//!
//! Endpoints come from the issuer's discovery document. When discovery is not
//! wanted (tests, air-gapped demos) they can be derived from an Okta-style
//! issuer URL or supplied explicitly in config.

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Path appended to the issuer to fetch the discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Scopes requested when config doesn't override them. `offline_access` is
/// what makes the token endpoint hand out a refresh token.
pub const DEFAULT_SCOPES: &str = "openid profile offline_access";

/// The subset of an OpenID Provider's metadata the demo uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
}

impl Endpoints {
    /// Derive endpoints from an Okta authorization server issuer
    /// (`https://{org}.okta.com/oauth2/default` → `.../v1/token` etc.).
    pub fn from_issuer(issuer: &str) -> Self {
        let base = issuer.trim_end_matches('/');
        Self {
            issuer: base.to_string(),
            authorization_endpoint: format!("{base}/v1/authorize"),
            token_endpoint: format!("{base}/v1/token"),
            userinfo_endpoint: format!("{base}/v1/userinfo"),
            end_session_endpoint: Some(format!("{base}/v1/logout")),
            revocation_endpoint: Some(format!("{base}/v1/revoke")),
        }
    }

    /// Fetch and validate the issuer's discovery document.
    ///
    /// The document's `issuer` must match the configured issuer (ignoring a
    /// trailing slash), otherwise tokens minted by it would fail validation
    /// anyway.
    pub async fn discover(client: &reqwest::Client, issuer: &str) -> Result<Self> {
        let issuer = issuer.trim_end_matches('/');
        let url = format!("{issuer}{DISCOVERY_PATH}");

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("discovery request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("discovery returned {status}")));
        }

        let endpoints = response
            .json::<Endpoints>()
            .await
            .map_err(|e| Error::InvalidResponse(format!("invalid discovery document: {e}")))?;

        if endpoints.issuer.trim_end_matches('/') != issuer {
            return Err(Error::InvalidResponse(format!(
                "discovery issuer {} does not match configured issuer {issuer}",
                endpoints.issuer
            )));
        }

        debug!(issuer, token_endpoint = %endpoints.token_endpoint, "discovered endpoints");
        Ok(endpoints)
    }
}

/// Registration details of this client at the identity provider.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    /// Only confidential clients have one; mobile/public clients rely on PKCE.
    pub client_secret: Option<Secret<String>>,
    pub redirect_uri: String,
    pub logout_redirect_uri: Option<String>,
    pub scopes: String,
}

impl ClientConfig {
    pub fn public(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            logout_redirect_uri: None,
            scopes: DEFAULT_SCOPES.to_string(),
        }
    }

    /// Client authentication parameters for token, refresh and revoke requests.
    pub(crate) fn auth_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("client_id", self.client_id.as_str())];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.expose().as_str()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serve a discovery document built from the server's own issuer URL.
    async fn serve_discovery(document: impl FnOnce(&str) -> serde_json::Value) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let issuer = format!("http://{}/oauth2/default", listener.local_addr().unwrap());
        let document = document(&issuer);
        tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/oauth2/default/.well-known/openid-configuration",
                axum::routing::get(move || async move { axum::Json(document) }),
            );
            axum::serve(listener, app).await.unwrap();
        });
        issuer
    }

    #[test]
    fn from_issuer_uses_okta_paths() {
        let endpoints = Endpoints::from_issuer("https://dev-1.okta.com/oauth2/default/");
        assert_eq!(endpoints.issuer, "https://dev-1.okta.com/oauth2/default");
        assert_eq!(
            endpoints.token_endpoint,
            "https://dev-1.okta.com/oauth2/default/v1/token"
        );
        assert_eq!(
            endpoints.end_session_endpoint.as_deref(),
            Some("https://dev-1.okta.com/oauth2/default/v1/logout")
        );
    }

    #[test]
    fn public_client_has_default_scopes_and_no_secret() {
        let config = ClientConfig::public("0oa123", "com.example:/callback");
        assert_eq!(config.scopes, DEFAULT_SCOPES);
        assert_eq!(config.auth_params(), vec![("client_id", "0oa123")]);
    }

    #[test]
    fn confidential_client_sends_secret() {
        let mut config = ClientConfig::public("0oa123", "com.example:/callback");
        config.client_secret = Some(Secret::new("shh".to_string()));
        assert_eq!(
            config.auth_params(),
            vec![("client_id", "0oa123"), ("client_secret", "shh")]
        );
    }

    #[tokio::test]
    async fn discover_reads_document() {
        let issuer = serve_discovery(|issuer| {
            serde_json::json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/v1/authorize"),
                "token_endpoint": format!("{issuer}/v1/token"),
                "userinfo_endpoint": format!("{issuer}/v1/userinfo"),
                "end_session_endpoint": format!("{issuer}/v1/logout"),
                "jwks_uri": format!("{issuer}/v1/keys"),
            })
        })
        .await;

        let client = reqwest::Client::new();
        let endpoints = Endpoints::discover(&client, &issuer).await.unwrap();
        assert_eq!(endpoints.token_endpoint, format!("{issuer}/v1/token"));
        assert_eq!(
            endpoints.end_session_endpoint,
            Some(format!("{issuer}/v1/logout"))
        );
        assert!(endpoints.revocation_endpoint.is_none());
    }

    #[tokio::test]
    async fn discover_rejects_issuer_mismatch() {
        let issuer = serve_discovery(|_| {
            serde_json::json!({
                "issuer": "https://evil.example.com",
                "authorization_endpoint": "https://evil.example.com/authorize",
                "token_endpoint": "https://evil.example.com/token",
                "userinfo_endpoint": "https://evil.example.com/userinfo",
            })
        })
        .await;

        let client = reqwest::Client::new();
        let err = Endpoints::discover(&client, &issuer).await.unwrap_err();
        assert!(err.to_string().contains("does not match"), "got: {err}");
    }

    #[tokio::test]
    async fn discover_fails_on_missing_document() {
        let issuer = serve_discovery(|_| serde_json::json!({})).await;
        let other = issuer.replace("/oauth2/default", "/oauth2/other");

        let client = reqwest::Client::new();
        let err = Endpoints::discover(&client, &other).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn discover_rejects_incomplete_document() {
        let issuer = serve_discovery(|issuer| serde_json::json!({ "issuer": issuer })).await;

        let client = reqwest::Client::new();
        let err = Endpoints::discover(&client, &issuer).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)), "got: {err:?}");
    }
}
