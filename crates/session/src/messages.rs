//! Backend message payload

use rand::RngExt;
use serde::{Deserialize, Serialize};

/// Returned instead of calling the backend when nobody is signed in.
pub const NOT_AUTHENTICATED: &str = "Not authenticated.";

/// Returned when the backend answers with an empty message list.
pub const NO_MESSAGES: &str = "No messages found.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub date: String,
    pub text: String,
}

/// Body of `GET /api/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub messages: Vec<Message>,
}

impl MessageResponse {
    /// One message chosen uniformly at random, `None` if the list is empty.
    pub fn pick_random(&self) -> Option<&Message> {
        if self.messages.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..self.messages.len());
        self.messages.get(index)
    }
}
