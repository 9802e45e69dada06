//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! A client secret, if the client has one, comes from the OIDC_CLIENT_SECRET
//! env var or `client_secret_file` and is never read from the TOML itself.

use common::Secret;
use oidc_auth::{ClientConfig, DEFAULT_SCOPES, Endpoints};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub oidc: OidcConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Identity provider and client registration
#[derive(Debug, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    /// Ask the identity provider not to reuse an existing browser session.
    #[serde(default = "default_true")]
    pub ephemeral_session: bool,
    #[serde(default)]
    pub logout_redirect_uri: Option<String>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to OIDC_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Fetch the discovery document. When off, Okta-style paths are derived
    /// from the issuer.
    #[serde(default = "default_true")]
    pub discover: bool,
    /// Explicit endpoints; skip discovery entirely.
    #[serde(default)]
    pub endpoints: Option<Endpoints>,
}

/// Resource server settings
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_messages_url")]
    pub messages_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where the session credential lives
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_credential_path")]
    pub credential_path: PathBuf,
}

fn default_scopes() -> String {
    DEFAULT_SCOPES.to_string()
}

fn default_true() -> bool {
    true
}

fn default_messages_url() -> String {
    "http://localhost:8000/api/messages".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_credential_path() -> PathBuf {
    PathBuf::from("auth-demo-credential.json")
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            messages_url: default_messages_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credential_path: default_credential_path(),
        }
    }
}

fn require_http(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. OIDC_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http("issuer", &config.oidc.issuer)?;
        require_http("messages_url", &config.backend.messages_url)?;

        if config.oidc.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if config.oidc.redirect_uri.trim().is_empty() {
            return Err(common::Error::Config(
                "redirect_uri must not be empty".into(),
            ));
        }
        if config.backend.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if let Ok(secret) = std::env::var("OIDC_CLIENT_SECRET") {
            config.oidc.client_secret = Secret::from_trimmed(&secret);
        } else if let Some(ref secret_file) = config.oidc.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            config.oidc.client_secret = Secret::from_trimmed(&secret);
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or AUTH_DEMO_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("AUTH_DEMO_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-demo.toml")
    }
}

impl OidcConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            logout_redirect_uri: self.logout_redirect_uri.clone(),
            scopes: self.scopes.clone(),
        }
    }
}
