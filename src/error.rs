//! Error types for the relay.
//!
//! Startup problems are [`ConfigError`]s and stop the listener from ever
//! binding. Everything raised while a message is being handled is caught at
//! the handler boundary and only logged.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors detected while loading configuration or constructing a handler.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The listener port is not a valid TCP port number.
    #[error("Invalid port '{0}': expected an integer between 0 and 65535")]
    InvalidPort(String),

    /// A numeric setting could not be parsed.
    #[error("Invalid value '{value}' for {key}: expected a positive integer")]
    InvalidNumber { key: &'static str, value: String },

    /// The handler selector names no known handler.
    #[error("Unknown handler '{0}': expected one of PRINT_HANDLER, GMAIL_PROXY_HANDLER")]
    UnknownHandler(String),

    /// A configuration or credential file could not be read.
    #[error("Unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The TOML configuration file is malformed.
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// A credential file was read but its contents are unusable.
    #[error("Invalid credentials in {}: {reason}", path.display())]
    Credentials { path: PathBuf, reason: String },

    /// The HTTP client for the remote API could not be built.
    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors raised while turning raw bytes into a parsed message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Parse(#[from] mailparse::MailParseError),
}

/// Errors from the remote mail API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport level failure (DNS, connect, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A response body could not be decoded.
    #[error("Unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    /// The token endpoint refused to issue an access token.
    #[error("Authorisation failed: {0}")]
    Auth(String),

    /// The outgoing message could not be serialised.
    #[error("Unable to compose message: {0}")]
    Compose(#[from] io::Error),
}

impl ApiError {
    /// Returns `true` if the failure came from credentials rather than the
    /// network or the message itself.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Status { status: 401 | 403, .. })
    }
}

/// Errors that end an SMTP session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection error: {0}")]
    Io(#[from] io::Error),

    #[error("Session timed out after {0} seconds")]
    Timeout(u64),
}
