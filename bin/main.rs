#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use smtp2gmail::{config::Config, controller::Controller, internal, logging};

fn startup() -> Result<Controller, smtp2gmail::error::ConfigError> {
    let config = Config::load()?;
    internal!(
        level = INFO,
        "Starting SMTP server on {}:{} with {}",
        config.hostname,
        config.port,
        config.handler
    );

    Controller::new(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let controller = startup().map_err(|err| {
        println!("Failed to start SMTP server with invalid environment settings: {err}");
        internal!(level = ERROR, "{err}");
        err
    })?;

    controller.run().await
}
