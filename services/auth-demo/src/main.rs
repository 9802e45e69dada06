//! Browser sign-in demo
//!
//! Command-line front end for the session coordinator:
//! 1. Loads config and restores any stored session
//! 2. Runs one intent (sign in/out, refresh, token info, user info, message)
//! 3. Prints the resulting view state

mod config;
mod provider_impl;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use oidc_auth::{CredentialFile, Endpoints};
use session::{AuthCoordinator, PresentationState, ViewState};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::provider_impl::{ConsoleSignIn, OidcCredentialStore};

const USAGE: &str = "usage: auth-demo [--config <path>] \
    <status|sign-in|sign-out|refresh|token-info|user-info|message>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    SignIn,
    SignOut,
    Refresh,
    TokenInfo,
    UserInfo,
    Message,
}

impl Command {
    /// First argument that isn't `--config <path>`; `status` when absent.
    fn parse(args: &[String]) -> Result<Self> {
        let mut rest = args.iter().skip(1);
        let mut command = None;
        while let Some(arg) = rest.next() {
            if arg == "--config" {
                rest.next();
                continue;
            }
            if command.is_some() {
                bail!("unexpected argument: {arg}\n{USAGE}");
            }
            command = Some(match arg.as_str() {
                "status" => Command::Status,
                "sign-in" => Command::SignIn,
                "sign-out" => Command::SignOut,
                "refresh" => Command::Refresh,
                "token-info" => Command::TokenInfo,
                "user-info" => Command::UserInfo,
                "message" => Command::Message,
                other => bail!("unknown command: {other}\n{USAGE}"),
            });
        }
        Ok(command.unwrap_or(Command::Status))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Stderr keeps stdout for the view.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());
    let command = Command::parse(&args)?;

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        issuer = %config.oidc.issuer,
        messages_url = %config.backend.messages_url,
        ephemeral_session = config.oidc.ephemeral_session,
        "configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.backend.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let endpoints = match &config.oidc.endpoints {
        Some(endpoints) => endpoints.clone(),
        None if config.oidc.discover => Endpoints::discover(&client, &config.oidc.issuer)
            .await
            .with_context(|| format!("endpoint discovery failed for {}", config.oidc.issuer))?,
        None => Endpoints::from_issuer(&config.oidc.issuer),
    };

    let file = CredentialFile::load(config.storage.credential_path.clone())
        .await
        .context("failed to load stored session")?;

    let client_config = config.oidc.client_config();
    let store = Arc::new(OidcCredentialStore::new(
        file,
        client.clone(),
        endpoints.clone(),
        client_config.clone(),
    ));
    let browser = Arc::new(ConsoleSignIn::new(
        BufReader::new(tokio::io::stdin()),
        client.clone(),
        endpoints,
        client_config,
        config.oidc.ephemeral_session,
    ));

    let coordinator = Arc::new(AuthCoordinator::new(
        store,
        browser,
        client,
        config.backend.messages_url.clone(),
    ));
    coordinator
        .restore()
        .await
        .context("failed to restore session")?;

    let ui = PresentationState::new(coordinator);
    run(&ui, command).await;
    if render(&ui.snapshot()) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run(ui: &PresentationState, command: Command) {
    info!(?command, "running");
    match command {
        Command::Status => {}
        Command::SignIn if ui.snapshot().authenticated => println!("Already signed in."),
        Command::SignOut if !ui.snapshot().authenticated => println!("Not signed in."),
        Command::SignIn | Command::SignOut => ui.toggle_auth().await,
        Command::Refresh => ui.refresh().await,
        Command::TokenInfo => match ui.fetch_token_info() {
            Some(info) => print!("{info}"),
            None => println!("No token info available."),
        },
        Command::UserInfo => match ui.fetch_user_info().await {
            Some(user) => println!("{user}"),
            None => println!("No user info available."),
        },
        Command::Message => ui.fetch_message().await,
    }
}

/// Print the view. Returns false when it carries an error.
fn render(view: &ViewState) -> bool {
    println!("{}", status_line(view));
    if let Some(message) = &view.server_message {
        println!("Message: {message}");
    }
    match &view.error {
        Some(error) => {
            eprintln!("Error: {error}");
            false
        }
        None => true,
    }
}

fn status_line(view: &ViewState) -> &'static str {
    match (view.authenticated, view.access_token.is_some()) {
        (true, true) => "Signed in (access token present)",
        (true, false) => "Signed in",
        (false, _) => "Signed out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("auth-demo")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_command_defaults_to_status() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Status);
    }

    #[test]
    fn parses_every_command() {
        for (arg, expected) in [
            ("status", Command::Status),
            ("sign-in", Command::SignIn),
            ("sign-out", Command::SignOut),
            ("refresh", Command::Refresh),
            ("token-info", Command::TokenInfo),
            ("user-info", Command::UserInfo),
            ("message", Command::Message),
        ] {
            assert_eq!(Command::parse(&args(&[arg])).unwrap(), expected, "{arg}");
        }
    }

    #[test]
    fn config_flag_value_is_not_a_command() {
        let parsed = Command::parse(&args(&["--config", "message", "sign-in"])).unwrap();
        assert_eq!(parsed, Command::SignIn);
        let parsed = Command::parse(&args(&["refresh", "--config", "/etc/auth-demo.toml"])).unwrap();
        assert_eq!(parsed, Command::Refresh);
    }

    #[test]
    fn unknown_command_is_rejected_with_usage() {
        let err = Command::parse(&args(&["login"])).unwrap_err().to_string();
        assert!(err.contains("unknown command: login"));
        assert!(err.contains("usage: auth-demo"));
    }

    #[test]
    fn extra_argument_is_rejected() {
        assert!(Command::parse(&args(&["status", "message"])).is_err());
    }

    #[test]
    fn error_in_view_fails_the_process() {
        let view = ViewState {
            error: Some("Network error: connection refused".into()),
            ..ViewState::default()
        };
        assert!(!render(&view));
        assert!(render(&ViewState::default()));
    }

    #[test]
    fn status_line_never_shows_the_token() {
        let view = ViewState {
            authenticated: true,
            access_token: Some("at_secret".into()),
            ..ViewState::default()
        };
        let line = status_line(&view);
        assert!(!line.contains("at_secret"));
        assert_eq!(status_line(&ViewState::default()), "Signed out");
    }
}
