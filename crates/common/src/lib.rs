//! Types shared by the auth demo crates: a redacting secret wrapper and
//! the configuration error type.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
