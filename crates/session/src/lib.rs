//! Session coordination for the browser sign-in demo
//!
//! `AuthCoordinator` owns the single session credential and orchestrates
//! sign-in, sign-out, refresh, user info and the backend call through the
//! `provider` traits. `PresentationState` mirrors its results into
//! UI-bindable fields and wraps every call in the loading/error discipline.
//!
//! Session lifecycle:
//! 1. `AuthCoordinator::restore()` picks up a credential left by a previous run
//! 2. `sign_in()` → browser flow → credential stored (SignedOut → SignedIn)
//! 3. `refresh_if_needed()` swaps the token set in place (SignedIn → SignedIn)
//! 4. `fetch_backend_message()` calls the backend with the access token
//! 5. `sign_out()` → provider notified, credential removed (→ SignedOut)

pub mod coordinator;
pub mod error;
pub mod messages;
pub mod presentation;

#[cfg(test)]
mod testing;

pub use coordinator::{AuthCoordinator, SessionState};
pub use error::{AuthError, Result};
pub use messages::{Message, MessageResponse, NO_MESSAGES, NOT_AUTHENTICATED};
pub use presentation::{PresentationState, ViewState};
