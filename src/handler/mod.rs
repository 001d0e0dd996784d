//! What happens to a message once the SMTP session has received it.

mod forwarding;
mod logging;

use std::{str::FromStr, sync::Arc};

use crate::{config::Config, error::ConfigError, gmail::GmailClient, internal};

pub use forwarding::{outgoing_message, ForwardingHandler};
pub use logging::{report, LoggingHandler};

/// Invoked once per complete message. Implementations catch and log their
/// own failures; the client is acknowledged whatever happens here.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, raw: &[u8]);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    /// Print a summary of each message to standard output
    Print,
    /// Forward each message through the Gmail API
    GmailProxy,
}

impl FromStr for HandlerKind {
    type Err = ConfigError;

    fn from_str(selector: &str) -> Result<Self, Self::Err> {
        if selector.eq_ignore_ascii_case("print_handler") {
            Ok(Self::Print)
        } else if selector.eq_ignore_ascii_case("gmail_proxy_handler") {
            Ok(Self::GmailProxy)
        } else {
            Err(ConfigError::UnknownHandler(selector.to_string()))
        }
    }
}

/// Build the handler `config` selects.
///
/// # Errors
///
/// Returns an error if the selector names no handler, or if the Gmail handler
/// is selected and its credential files cannot be loaded.
pub fn from_config(config: &Config) -> Result<Arc<dyn MessageHandler>, ConfigError> {
    match config.handler.parse::<HandlerKind>()? {
        HandlerKind::Print => {
            internal!(level = INFO, "Messages will be printed to standard output");
            Ok(Arc::new(LoggingHandler::new()))
        }
        HandlerKind::GmailProxy => {
            let client = GmailClient::from_files(&config.client_secret_file, &config.token_file)?;
            internal!(level = INFO, "Messages will be forwarded through the Gmail API");
            Ok(Arc::new(ForwardingHandler::new(client)))
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::{from_config, HandlerKind};
    use crate::{config::Config, error::ConfigError};

    #[test]
    fn selector_is_case_insensitive() {
        for selector in ["PRINT_HANDLER", "print_handler", "Print_Handler"] {
            assert_eq!(selector.parse::<HandlerKind>().unwrap(), HandlerKind::Print);
        }

        for selector in ["GMAIL_PROXY_HANDLER", "gmail_proxy_handler"] {
            assert_eq!(
                selector.parse::<HandlerKind>().unwrap(),
                HandlerKind::GmailProxy
            );
        }

        assert!(matches!(
            "smtp_handler".parse::<HandlerKind>(),
            Err(ConfigError::UnknownHandler(selector)) if selector == "smtp_handler"
        ));
        assert!(" print_handler".parse::<HandlerKind>().is_err());
    }

    #[test]
    fn print_handler_from_config() {
        let handler = from_config(&Config::default()).unwrap();
        assert_eq!(handler.name(), "print_handler");
    }

    #[test]
    fn unknown_handler_from_config() {
        let config = Config {
            handler: String::from("nonsense"),
            ..Config::default()
        };

        assert!(matches!(
            from_config(&config),
            Err(ConfigError::UnknownHandler(_))
        ));
    }

    #[test]
    fn gmail_handler_needs_credentials() {
        let config = Config {
            handler: String::from("gmail_proxy_handler"),
            client_secret_file: "/does/not/exist/client_secret.json".into(),
            ..Config::default()
        };

        assert!(matches!(from_config(&config), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn gmail_handler_from_config() {
        let mut secret = tempfile::NamedTempFile::new().unwrap();
        secret
            .write_all(br#"{"web":{"client_id":"id","client_secret":"shh"}}"#)
            .unwrap();
        let mut token = tempfile::NamedTempFile::new().unwrap();
        token.write_all(br#"{"refresh_token":"refresh"}"#).unwrap();

        let config = Config {
            handler: String::from("GMAIL_PROXY_HANDLER"),
            client_secret_file: secret.path().to_path_buf(),
            token_file: token.path().to_path_buf(),
            ..Config::default()
        };

        let handler = from_config(&config).unwrap();
        assert_eq!(handler.name(), "gmail_proxy_handler");
    }
}
