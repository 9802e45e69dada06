//! The stored session credential and its on-disk slot
//!
//! Exactly one credential exists per credential file. All writes use atomic
//! temp-file + rename to prevent corruption on crash, and a tokio Mutex
//! serializes writers. Signing out deletes the file.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenSet;
use crate::userinfo::UserInfo;

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A signed-in session: the token set plus bookkeeping.
///
/// `issued_at`/`expires_at` are unix timestamps in milliseconds, computed
/// when the token set was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: TokenSet,
    pub issued_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Last profile fetched with this token set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

impl Credential {
    pub fn new(token: TokenSet, now_millis: u64) -> Self {
        let expires_at = token
            .expires_in
            .map(|secs| secs.saturating_mul(1000).saturating_add(now_millis));
        Self {
            token,
            issued_at: now_millis,
            expires_at,
            user_info: None,
        }
    }

    /// Apply a refresh response.
    ///
    /// Refresh and ID tokens missing from the response carry over from the
    /// previous set. Cached user info is dropped because it belonged to the
    /// old access token.
    pub fn refreshed(self, mut token: TokenSet, now_millis: u64) -> Self {
        if token.refresh_token.is_none() {
            token.refresh_token = self.token.refresh_token;
        }
        if token.id_token.is_none() {
            token.id_token = self.token.id_token;
        }
        Self::new(token, now_millis)
    }

    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn id_token(&self) -> Option<&str> {
        self.token.id_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token.refresh_token.as_deref()
    }

    /// Credentials without an expiry never report expired.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_at.is_some_and(|at| now_millis >= at)
    }
}

/// Single-slot credential file.
///
/// Reads come from memory; the file is read once at load time.
pub struct CredentialFile {
    path: PathBuf,
    state: Mutex<Option<Credential>>,
}

impl CredentialFile {
    /// Load the credential from `path`. A missing file means signed out.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::Io(format!("checking credential file: {e}")))?;
        let state = if exists {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let credential: Credential = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), "loaded stored session");
            Some(credential)
        } else {
            info!(path = %path.display(), "no stored session");
            None
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone of the stored credential.
    pub async fn get(&self) -> Option<Credential> {
        self.state.lock().await.clone()
    }

    /// Persist `credential`, replacing whatever was stored.
    ///
    /// Memory is only updated once the file write succeeded.
    pub async fn replace(&self, credential: Credential) -> Result<()> {
        let mut state = self.state.lock().await;
        write_atomic(&self.path, &credential).await?;
        let replaced = state.replace(credential).is_some();
        debug!(replaced, "stored credential");
        Ok(())
    }

    /// Delete the stored credential. Returns it if there was one.
    pub async fn clear(&self) -> Result<Option<Credential>> {
        let mut state = self.state.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "deleted credential file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(format!("deleting credential file: {e}"))),
        }
        Ok(state.take())
    }
}

/// Write the credential to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Permissions are 0600 since the file holds bearer tokens.
async fn write_atomic(path: &Path, credential: &Credential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credential.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}
