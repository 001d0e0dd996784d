//! Minimal Gmail API client used by the forwarding handler.

pub mod auth;
pub mod client;
pub mod compose;
pub mod credentials;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub use client::GmailClient;

/// A message to submit through the remote API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub sender: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub msg_plain: String,
    pub msg_html: String,
    /// Append the account's signature. Never set by the relay.
    pub signature: bool,
}

/// Identifiers the API assigns to a sent message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Anything that can submit an [`OutgoingMessage`] on our behalf.
#[async_trait::async_trait]
pub trait MailApi: Send + Sync {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, ApiError>;
}
