//! Token endpoint interactions
//!
//! Three calls, all form-encoded POSTs:
//! 1. Authorization code exchange (end of the browser sign-in)
//! 2. Refresh-token grant
//! 3. Token revocation (RFC 7009) on sign-out

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoints::{ClientConfig, Endpoints};
use crate::error::{Error, Result};

/// Token set returned by the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time;
/// `Credential::new` turns it into an absolute timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Raw JWT; see `TokenInfo` for the decoded view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Exchange an authorization code plus PKCE verifier for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    config: &ClientConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenSet> {
    let mut form = config.auth_params();
    form.extend([
        ("grant_type", "authorization_code"),
        ("code", code),
        ("code_verifier", verifier),
        ("redirect_uri", config.redirect_uri.as_str()),
    ]);

    let response = client
        .post(&endpoints.token_endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenSet>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

/// Redeem a refresh token for a new token set.
///
/// Providers may omit `refresh_token` and `id_token` from the response;
/// `Credential::refreshed` keeps the previous values in that case.
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    config: &ClientConfig,
    refresh: &str,
) -> Result<TokenSet> {
    let mut form = config.auth_params();
    form.extend([
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh),
        ("scope", config.scopes.as_str()),
    ]);

    let response = client
        .post(&endpoints.token_endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // invalid_grant (400) or 401/403: the refresh token is expired or revoked
        if status.as_u16() == 401 || status.as_u16() == 403 || body.contains("invalid_grant") {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenSet>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}

/// Revoke a token. A provider without a revocation endpoint is not an error:
/// there is simply nothing to notify.
pub async fn revoke_token(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    config: &ClientConfig,
    token: &str,
    token_type_hint: &str,
) -> Result<()> {
    let Some(revocation) = &endpoints.revocation_endpoint else {
        debug!("no revocation endpoint, skipping revoke");
        return Ok(());
    };

    let mut form = config.auth_params();
    form.extend([("token", token), ("token_type_hint", token_type_hint)]);

    let response = client
        .post(revocation)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("revocation request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Http(format!("revocation endpoint returned {status}")));
    }

    debug!(token_type_hint, "token revoked");
    Ok(())
}
