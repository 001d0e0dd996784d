//! Process configuration.
//!
//! Settings are read once at startup. Built-in defaults are overridden by an
//! optional TOML file (named by `SMTP2GMAIL_CONFIG`), which is in turn
//! overridden by individual environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

pub const CONFIG_FILE_VAR: &str = "SMTP2GMAIL_CONFIG";

const HOSTNAME_VAR: &str = "SMTP_HOSTNAME";
const PORT_VAR: &str = "SMTP_PORT";
const HANDLER_VAR: &str = "SMTP_HANDLER";
const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET_FILE";
const TOKEN_FILE_VAR: &str = "GMAIL_TOKEN_FILE";
const TIMEOUT_VAR: &str = "SMTP_TIMEOUT_SECS";
const MAX_SIZE_VAR: &str = "SMTP_MAX_MESSAGE_SIZE";
const BANNER_VAR: &str = "SMTP_BANNER";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host the SMTP listener binds to
    pub hostname: String,
    pub port: u16,
    /// Handler selector, matched case-insensitively
    pub handler: String,
    /// Google OAuth client secret, only read by the Gmail handler
    pub client_secret_file: PathBuf,
    /// Stored OAuth refresh token, only read by the Gmail handler
    pub token_file: PathBuf,
    /// Idle timeout for a single SMTP session
    pub timeout_secs: u64,
    /// Largest message body accepted after DATA, in bytes
    pub max_message_size: usize,
    /// Host name announced in the greeting and EHLO reply
    pub banner: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: String::from("localhost"),
            port: 8025,
            handler: String::from("PRINT_HANDLER"),
            client_secret_file: PathBuf::from("./client_secret.json"),
            token_file: PathBuf::from("./gmail_token.json"),
            timeout_secs: 300,
            max_message_size: 32 * 1024 * 1024,
            banner: String::from("smtp2gmail"),
        }
    }
}

impl Config {
    /// Load the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed, or
    /// if any numeric setting is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration using `lookup` in place of the environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_VAR) {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };

        config.apply(lookup)?;

        Ok(config)
    }

    /// Read a TOML configuration file. Keys that are absent keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(toml::from_str(&content)?)
    }

    fn apply<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(hostname) = lookup(HOSTNAME_VAR) {
            self.hostname = hostname;
        }

        if let Some(port) = lookup(PORT_VAR) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port))?;
        }

        if let Some(handler) = lookup(HANDLER_VAR) {
            self.handler = handler;
        }

        if let Some(path) = lookup(CLIENT_SECRET_VAR) {
            self.client_secret_file = PathBuf::from(path);
        }

        if let Some(path) = lookup(TOKEN_FILE_VAR) {
            self.token_file = PathBuf::from(path);
        }

        if let Some(timeout) = lookup(TIMEOUT_VAR) {
            self.timeout_secs = parse_positive(TIMEOUT_VAR, &timeout)?;
        }

        if let Some(size) = lookup(MAX_SIZE_VAR) {
            self.max_message_size = parse_positive(MAX_SIZE_VAR, &size)?;
        }

        if let Some(banner) = lookup(BANNER_VAR) {
            self.banner = banner;
        }

        Ok(())
    }
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialEq,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, io::Write, path::PathBuf};

    use pretty_assertions::assert_eq;

    use super::{Config, CONFIG_FILE_VAR};
    use crate::error::ConfigError;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.port, 8025);
        assert_eq!(config.handler, "PRINT_HANDLER");
        assert_eq!(
            config.client_secret_file,
            PathBuf::from("./client_secret.json")
        );
    }

    #[test]
    fn environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SMTP_HOSTNAME", "0.0.0.0"),
            ("SMTP_PORT", "2525"),
            ("SMTP_HANDLER", "gmail_proxy_handler"),
            ("CLIENT_SECRET_FILE", "/etc/secret.json"),
            ("SMTP_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.hostname, "0.0.0.0");
        assert_eq!(config.port, 2525);
        assert_eq!(config.handler, "gmail_proxy_handler");
        assert_eq!(config.client_secret_file, PathBuf::from("/etc/secret.json"));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn invalid_port() {
        let err = Config::from_lookup(lookup(&[("SMTP_PORT", "smtp")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(port) if port == "smtp"));

        let err = Config::from_lookup(lookup(&[("SMTP_PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));
    }

    #[test]
    fn invalid_numbers() {
        let err = Config::from_lookup(lookup(&[("SMTP_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "SMTP_TIMEOUT_SECS",
                ..
            }
        ));

        let err = Config::from_lookup(lookup(&[("SMTP_MAX_MESSAGE_SIZE", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn file_then_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "hostname = \"127.0.0.1\"\nport = 2526\nhandler = \"gmail_proxy_handler\""
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = Config::from_lookup(lookup(&[(CONFIG_FILE_VAR, path.as_str())])).unwrap();
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.port, 2526);
        assert_eq!(config.handler, "gmail_proxy_handler");
        assert_eq!(config.banner, "smtp2gmail");

        let config =
            Config::from_lookup(lookup(&[(CONFIG_FILE_VAR, path.as_str()), ("SMTP_PORT", "2600")]))
                .unwrap();
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.port, 2600);
    }

    #[test]
    fn missing_file() {
        let err = Config::from_lookup(lookup(&[(CONFIG_FILE_VAR, "/does/not/exist.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
