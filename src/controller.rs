use std::sync::{Arc, LazyLock};

use tokio::sync::broadcast;

use crate::{
    config::Config,
    error::ConfigError,
    handler::{self, MessageHandler},
    internal,
    listener::Listener,
    smtp::session::SessionConfig,
    Signal,
};

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await
}

/// Wait for SIGINT or SIGTERM, then tell everything listening to stop.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed or nobody is
/// listening for the shutdown broadcast.
pub async fn shutdown() -> anyhow::Result<()> {
    wait_for_signal().await?;
    internal!(level = INFO, "Shutdown requested");

    SHUTDOWN_BROADCAST.send(Signal::Shutdown)?;

    Ok(())
}

/// Owns the configuration and the selected handler, and runs the listener.
pub struct Controller {
    config: Config,
    handler: Arc<dyn MessageHandler>,
}

impl Controller {
    /// Select the handler named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler is unknown or cannot be constructed.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let handler = handler::from_config(&config)?;
        Ok(Self::with_handler(config, handler))
    }

    pub fn with_handler(config: Config, handler: Arc<dyn MessageHandler>) -> Self {
        Self { config, handler }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Bind the configured address without accepting anything yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(&self) -> std::io::Result<Listener> {
        Listener::bind(
            &self.config.hostname,
            self.config.port,
            self.handler.clone(),
            SessionConfig::from(&self.config),
        )
        .await
    }

    /// Run this controller, and everything it controls, until shutdown
    ///
    /// # Errors
    ///
    /// This function will return an error if the listener cannot be bound or
    /// stops accepting connections.
    pub async fn run(self) -> anyhow::Result<()> {
        internal!("Controller running");

        let listener = self.bind().await?;
        let mut server = tokio::spawn(listener.serve(SHUTDOWN_BROADCAST.subscribe()));

        tokio::select! {
            result = &mut server => return result?,
            result = shutdown() => result?,
        }

        server.await??;

        internal!("Shutting down...");

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::Controller;
    use crate::{config::Config, error::ConfigError};

    #[test]
    fn unknown_handler_is_rejected() {
        let config = Config {
            handler: String::from("SOMETHING_ELSE"),
            ..Config::default()
        };

        assert!(matches!(
            Controller::new(config),
            Err(ConfigError::UnknownHandler(_))
        ));
    }

    #[tokio::test]
    async fn binds_configured_address() {
        let config = Config {
            hostname: String::from("127.0.0.1"),
            port: 0,
            ..Config::default()
        };

        let controller = Controller::new(config).unwrap();
        assert_eq!(controller.config().hostname, "127.0.0.1");

        let listener = controller.bind().await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }
}
