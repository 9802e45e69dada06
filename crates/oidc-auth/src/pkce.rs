//! PKCE (RFC 7636) and the browser-facing URLs of the sign-in flow
//!
//! The verifier never leaves the client until the code exchange; the S256
//! challenge goes into the authorization URL. The same module builds the
//! end-session URL used on sign-out and parses whatever the user pastes back
//! from the redirect.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::endpoints::{ClientConfig, Endpoints};
use crate::error::{Error, Result};

/// Generate a PKCE code verifier.
///
/// 64 random bytes encode to 86 URL-safe characters, inside the 43-128
/// range RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque CSRF `state` for one authorization request.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Build the authorization URL the user opens in a browser.
///
/// With `ephemeral` set the request carries `prompt=login`, so an existing
/// browser session at the identity provider is not reused and nothing about
/// this sign-in is meant to outlive it.
pub fn build_authorization_url(
    endpoints: &Endpoints,
    client: &ClientConfig,
    state: &str,
    challenge: &str,
    ephemeral: bool,
) -> Result<String> {
    let mut params = vec![
        ("client_id", client.client_id.as_str()),
        ("redirect_uri", client.redirect_uri.as_str()),
        ("response_type", "code"),
        ("scope", client.scopes.as_str()),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
        ("state", state),
    ];
    if ephemeral {
        params.push(("prompt", "login"));
    }

    let url = Url::parse_with_params(&endpoints.authorization_endpoint, &params)
        .map_err(|e| Error::Callback(format!("invalid authorization endpoint: {e}")))?;
    Ok(url.into())
}

/// Build the RP-initiated logout URL, or `None` when the provider doesn't
/// advertise an end-session endpoint.
pub fn build_end_session_url(
    endpoints: &Endpoints,
    client: &ClientConfig,
    id_token: &str,
    state: &str,
) -> Result<Option<String>> {
    let Some(end_session) = &endpoints.end_session_endpoint else {
        return Ok(None);
    };

    let mut params = vec![("id_token_hint", id_token), ("state", state)];
    if let Some(redirect) = &client.logout_redirect_uri {
        params.push(("post_logout_redirect_uri", redirect.as_str()));
    }

    let url = Url::parse_with_params(end_session, &params)
        .map_err(|e| Error::Callback(format!("invalid end-session endpoint: {e}")))?;
    Ok(Some(url.into()))
}

/// Extract the authorization code from what the user pasted.
///
/// Accepts the full redirect URL (`...?code=X&state=Y`), the `code#state`
/// form shown by hosted callback pages, or a bare code. Whenever a state is
/// present it must equal `expected_state`.
pub fn parse_callback(input: &str, expected_state: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::Callback("empty callback".into()));
    }

    if let Ok(url) = Url::parse(input) {
        return parse_redirect_url(&url, expected_state);
    }

    let (code, state) = match input.split_once('#') {
        Some((code, state)) => (code, Some(state)),
        None => (input, None),
    };
    if let Some(state) = state {
        check_state(state, expected_state)?;
    }
    if code.is_empty() {
        return Err(Error::Callback("missing authorization code".into()));
    }
    Ok(code.to_string())
}

fn parse_redirect_url(url: &Url, expected_state: &str) -> Result<String> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let detail = description.unwrap_or_else(|| error.clone());
        if error == "access_denied" {
            return Err(Error::AccessDenied(detail));
        }
        return Err(Error::Callback(format!("{error}: {detail}")));
    }

    let state = state.ok_or_else(|| Error::Callback("redirect is missing state".into()))?;
    check_state(&state, expected_state)?;
    code.ok_or_else(|| Error::Callback("redirect is missing code".into()))
}

fn check_state(actual: &str, expected: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Callback("state mismatch".into()))
    }
}
