use std::{
    io,
    net::SocketAddr,
    sync::{atomic::AtomicU64, Arc},
};

use tokio::{net::TcpListener, sync::broadcast};

use crate::{
    handler::MessageHandler,
    internal,
    smtp::session::{Session, SessionConfig},
    Signal,
};

/// Accepts SMTP connections and runs one session task per connection.
pub struct Listener {
    listener: TcpListener,
    handler: Arc<dyn MessageHandler>,
    config: Arc<SessionConfig>,
    queue: Arc<AtomicU64>,
}

impl Listener {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be resolved or the port is in use.
    pub async fn bind(
        hostname: &str,
        port: u16,
        handler: Arc<dyn MessageHandler>,
        config: SessionConfig,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind((hostname, port)).await?;

        Ok(Self {
            listener,
            handler,
            config: Arc::new(config),
            queue: Arc::default(),
        })
    }

    /// The address actually bound, useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has gone away.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until a shutdown signal arrives. Sessions still
    /// running at that point are left to finish on their own.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting a connection fails.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) -> anyhow::Result<()> {
        let address = self.local_addr()?;
        internal!(
            level = INFO,
            "SMTP listener on {address} using {}",
            self.handler.name()
        );

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                        internal!(level = INFO, "SMTP listener {address} received shutdown signal");
                        break;
                    }
                }

                connection = self.listener.accept() => {
                    let (stream, peer) = connection?;
                    tracing::debug!("Connection received from {peer}");

                    let session = Session::create(
                        self.queue.clone(),
                        stream,
                        peer,
                        self.config.clone(),
                        self.handler.clone(),
                    );

                    tokio::spawn(async move {
                        if let Err(err) = session.run().await {
                            internal!(level = WARN, "Session with {peer} ended: {err}");
                        }
                    });
                }
            }
        }

        Ok(())
    }
}
