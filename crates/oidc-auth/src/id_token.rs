//! Read-only view of ID token claims
//!
//! The ID token was validated by the identity provider exchange that produced
//! it; here the payload is only decoded for display. Nothing in this module
//! checks signatures, so never use `IdTokenClaims` for authorization
//! decisions.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Claims the demo displays. Unknown claims are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub auth_time: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl IdTokenClaims {
    /// Decode the payload segment of a compact JWS.
    pub fn decode(raw: &str) -> Result<Self> {
        let mut segments = raw.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::IdToken("expected three dot-separated segments".into()));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| Error::IdToken(format!("payload is not base64url: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::IdToken(format!("payload is not a claims object: {e}")))
    }
}

/// Projection of the current ID token shown on the token info screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub id_token: String,
    pub issuer: Option<String>,
    pub preferred_username: Option<String>,
    pub auth_time: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl TokenInfo {
    pub fn from_id_token(raw: &str) -> Result<Self> {
        let claims = IdTokenClaims::decode(raw)?;
        Ok(Self {
            id_token: raw.to_string(),
            issuer: claims.iss,
            preferred_username: claims.preferred_username,
            auth_time: claims.auth_time.and_then(|t| DateTime::from_timestamp(t, 0)),
            issued_at: claims.iat.and_then(|t| DateTime::from_timestamp(t, 0)),
        })
    }
}

impl fmt::Display for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const TIME_FORMAT: &str = "%b %-d, %Y %H:%M:%S UTC";

        writeln!(f, "ID Token: {}", self.id_token)?;
        writeln!(
            f,
            "Preferred username: {}",
            self.preferred_username
                .as_deref()
                .unwrap_or("No preferred_username found")
        )?;
        writeln!(
            f,
            "Token Issuer: {}",
            self.issuer.as_deref().unwrap_or("No Issuer found")
        )?;
        if let Some(auth_time) = self.auth_time {
            writeln!(f, "Auth time: {}", auth_time.format(TIME_FORMAT))?;
        }
        if let Some(issued_at) = self.issued_at {
            writeln!(f, "Issued at: {}", issued_at.format(TIME_FORMAT))?;
        }
        Ok(())
    }
}
