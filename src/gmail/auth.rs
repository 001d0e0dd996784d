//! OAuth2 refresh-token exchange with a cached access token.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{error::ApiError, internal};

use super::credentials::{ClientSecret, StoredToken};

/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug)]
pub struct TokenProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, secret: ClientSecret, token: StoredToken) -> Self {
        Self {
            http,
            token_uri: token.token_uri.unwrap_or(secret.token_uri),
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            refresh_token: token.refresh_token,
            cached: Mutex::new(None),
        }
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Return a usable access token, exchanging the refresh token if the
    /// cached one is missing or about to expire.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint cannot be reached or refuses the
    /// refresh token.
    pub async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }

    /// Forget the cached access token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn refresh(&self) -> Result<AccessToken, ApiError> {
        internal!(level = DEBUG, "Refreshing access token from {}", self.token_uri);

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(serde_json::from_str::<TokenError>(&body).map_or_else(
                |_| ApiError::Status {
                    status: status.as_u16(),
                    body: body.clone(),
                },
                |err| {
                    ApiError::Auth(match err.error_description {
                        Some(description) => format!("{}: {description}", err.error),
                        None => err.error,
                    })
                },
            ));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in.unwrap_or(3600)),
        })
    }
}
