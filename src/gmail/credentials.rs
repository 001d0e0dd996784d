//! Google OAuth credential files.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize};

use crate::error::ConfigError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    String::from(DEFAULT_TOKEN_URI)
}

/// OAuth client registration, as downloaded from the Google Cloud console.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// The console wraps the registration in an `installed` or `web` object
/// depending on the application type.
#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClientSecretFile {
    Installed(ClientSecret),
    Web(ClientSecret),
}

impl ClientSecret {
    /// Load a client secret JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not JSON, or lacks the
    /// client id or secret.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let (ClientSecretFile::Installed(secret) | ClientSecretFile::Web(secret)) =
            read_json(path)?;

        if secret.client_id.trim().is_empty() {
            return Err(ConfigError::Credentials {
                path: path.to_path_buf(),
                reason: String::from("client_id is empty"),
            });
        }

        Ok(secret)
    }
}

/// Previously authorised user token. Only the refresh token is needed; any
/// access token stored alongside it is ignored and fetched afresh.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StoredToken {
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl StoredToken {
    /// Load a stored token JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not JSON, or has no
    /// refresh token.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let token: Self = read_json(path)?;

        if token.refresh_token.trim().is_empty() {
            return Err(ConfigError::Credentials {
                path: path.to_path_buf(),
                reason: String::from("refresh_token is empty"),
            });
        }

        Ok(token)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|err| ConfigError::Credentials {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
