use std::{path::Path, time::Duration};

use serde_json::json;

use crate::{
    error::{ApiError, ConfigError},
    internal,
};

use super::{
    auth::TokenProvider,
    compose::{compose, encode_raw},
    credentials::{ClientSecret, StoredToken},
    MailApi, OutgoingMessage, SentMessage,
};

pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct GmailClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    api_base: String,
}

impl GmailClient {
    /// Build a client from a client secret file and a stored token file.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is missing or malformed, or if the HTTP
    /// client cannot be constructed.
    pub fn from_files<S, T>(client_secret: S, token: T) -> Result<Self, ConfigError>
    where
        S: AsRef<Path>,
        T: AsRef<Path>,
    {
        let secret = ClientSecret::load(client_secret)?;
        let token = StoredToken::load(token)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            tokens: TokenProvider::new(http.clone(), secret, token),
            http,
            api_base: String::from(DEFAULT_API_BASE),
        })
    }

    /// Send API requests somewhere other than Google, e.g. a local mock.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!("{}/gmail/v1/users/me/messages/send", self.api_base)
    }
}

#[async_trait::async_trait]
impl MailApi for GmailClient {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, ApiError> {
        let raw = compose(message)?;
        let access_token = self.tokens.access_token().await?;

        internal!(
            level = DEBUG,
            "Submitting {} byte message to {}",
            raw.len(),
            message.to
        );

        let response = self
            .http
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&json!({ "raw": encode_raw(&raw) }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }

            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
