//! OpenID Connect plumbing for the browser sign-in demo
//!
//! Everything here is thin glue around an identity provider: the data model
//! for a stored session, read-only projections of the ID token, and the
//! handful of HTTP calls a public client makes. The session coordinator in
//! the `session` crate never calls these directly; it goes through the
//! `provider` traits, which the demo binary implements on top of this crate.
//!
//! Sign-in flow as wired by the demo binary:
//! 1. `endpoints::Endpoints::discover()` resolves the issuer's endpoints
//! 2. `pkce::generate_verifier()` + `pkce::build_authorization_url()`
//! 3. User authorizes in a browser and pastes the callback
//! 4. `pkce::parse_callback()` then `token::exchange_code()`
//! 5. Credential persisted via `credentials::CredentialFile::replace()`
//! 6. `token::refresh_token()` on explicit refresh
//! 7. Sign-out: `token::revoke_token()` + `pkce::build_end_session_url()`

pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod id_token;
pub mod pkce;
pub mod token;
pub mod userinfo;

pub use credentials::{Credential, CredentialFile, now_millis};
pub use endpoints::{ClientConfig, DEFAULT_SCOPES, Endpoints};
pub use error::{Error, Result};
pub use id_token::{IdTokenClaims, TokenInfo};
pub use pkce::{
    build_authorization_url, build_end_session_url, compute_challenge, generate_state,
    generate_verifier, parse_callback,
};
pub use token::{TokenSet, exchange_code, refresh_token, revoke_token};
pub use userinfo::{UserInfo, fetch_user_info};
