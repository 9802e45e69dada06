//! UserInfo endpoint

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Standard profile claims from the UserInfo endpoint.
///
/// `updated_at` arrives as epoch seconds per OIDC Core 5.1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name.as_deref().unwrap_or("No Name set"))?;
        write!(
            f,
            "Username: {}",
            self.preferred_username.as_deref().unwrap_or("No Username set")
        )?;
        if let Some(updated_at) = self.updated_at {
            write!(f, "\nUpdated at: {}", updated_at.format("%b %-d, %Y %H:%M UTC"))?;
        }
        Ok(())
    }
}

/// Fetch the signed-in user's profile with the access token.
pub async fn fetch_user_info(
    client: &reqwest::Client,
    userinfo_endpoint: &str,
    access_token: &str,
) -> Result<UserInfo> {
    let response = client
        .get(userinfo_endpoint)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("userinfo request failed: {e}")))?;

    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(Error::InvalidCredentials(format!(
            "userinfo endpoint rejected access token ({status})"
        )));
    }
    if !status.is_success() {
        return Err(Error::Http(format!("userinfo endpoint returned {status}")));
    }

    let info = response
        .json::<UserInfo>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid userinfo response: {e}")))?;
    debug!(has_name = info.name.is_some(), "fetched user info");
    Ok(info)
}
