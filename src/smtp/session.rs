use std::{
    fmt::Display,
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{
    config::Config, error::SessionError, handler::MessageHandler, incoming, internal, outgoing,
    traits::fsm::FiniteStateMachine,
};

use super::{command::Command, context::Context, extensions::Extension, status::Status, State};

/// Longest command line accepted, terminator included. Anything longer is
/// discarded up to its newline and answered with a single 500.
const COMMAND_LINE_LIMIT: u64 = 4096;

/// Per-session settings shared by every connection of a listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub banner: String,
    pub timeout: Duration,
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            banner: if config.banner.is_empty() {
                String::from("localhost")
            } else {
                config.banner.clone()
            },
            timeout: Duration::from_secs(config.timeout_secs),
            max_message_size: config.max_message_size,
        }
    }
}

pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    queue: Arc<AtomicU64>,
    peer: SocketAddr,
    state: State,
    context: Context,
    config: Arc<SessionConfig>,
    handler: Arc<dyn MessageHandler>,
    stream: BufReader<Stream>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    pub fn create(
        queue: Arc<AtomicU64>,
        stream: Stream,
        peer: SocketAddr,
        config: Arc<SessionConfig>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            queue,
            peer,
            state: State::default(),
            context: Context::default(),
            config,
            handler,
            stream: BufReader::new(stream),
        }
    }

    /// Drive the session until the client quits or disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the client stays idle for
    /// longer than the configured timeout.
    pub async fn run(mut self) -> Result<(), SessionError> {
        internal!("Connected to {}", self.peer);

        let result = self.run_inner().await;

        internal!("Connection to {} closed", self.peer);

        result
    }

    async fn run_inner(&mut self) -> Result<(), SessionError> {
        let banner = self.config.banner.clone();
        self.reply(Status::ServiceReady, banner).await?;

        let mut line = Vec::new();

        loop {
            line.clear();

            if self.read_line(&mut line, COMMAND_LINE_LIMIT).await? == 0 {
                // The other side has closed the connection
                return Ok(());
            }

            if !line.ends_with(b"\n") && line.len() as u64 == COMMAND_LINE_LIMIT {
                self.discard_line().await?;
                internal!(level = WARN, "Client {} sent an overlong command line", self.peer);
                self.reply(Status::SyntaxError, "Line too long").await?;
                continue;
            }

            let command = Command::try_from(line.as_slice()).unwrap_or_else(|e| e);
            incoming!("{command}");

            if self.respond(command).await? {
                return Ok(());
            }
        }
    }

    /// Apply one command and answer it. Returns `true` once the session
    /// should end.
    async fn respond(&mut self, command: Command) -> Result<bool, SessionError> {
        let previous = self.state;
        let detail = command.inner().to_string();
        let acknowledge = matches!(command, Command::Rset | Command::Noop);
        let next = previous.transition(command, &mut self.context);

        tracing::debug!("Transitioned from {previous:?} to {next:?}");

        self.state = if next.is_rejection() { previous } else { next };

        match next {
            _ if acknowledge => self.reply(Status::Ok, "Ok").await?,
            State::Ehlo => {
                let mut lines = vec![format!("{} Hello {}", self.config.banner, self.context.id())];
                lines.extend(
                    [
                        Extension::Size(self.config.max_message_size),
                        Extension::EightBitMime,
                    ]
                    .iter()
                    .map(ToString::to_string),
                );
                self.reply_lines(Status::Ok, &lines).await?;
            }
            State::Helo => {
                let text = format!("{} Hello {}", self.config.banner, self.context.id());
                self.reply(Status::Ok, text).await?;
            }
            State::MailFrom => match self.context.declared_size {
                Some(size) if size > self.config.max_message_size => {
                    self.context.reset();
                    self.state = previous;
                    let text = format!(
                        "Declared message size {size} bytes exceeds maximum allowed size {} bytes",
                        self.config.max_message_size
                    );
                    self.reply(Status::ExceededStorage, text).await?;
                }
                _ => self.reply(Status::Ok, "Ok").await?,
            },
            State::Data => {
                self.reply(Status::StartMailInput, "End data with <CR><LF>.<CR><LF>")
                    .await?;
                self.receive_data().await?;
            }
            State::Quit => {
                self.reply(Status::GoodBye, "Bye").await?;
                return Ok(true);
            }
            State::InvalidCommandSequence => {
                self.reply(Status::InvalidCommandSequence, "Bad sequence of commands")
                    .await?;
            }
            State::Invalid => {
                self.reply(Status::SyntaxError, "Syntax error, command unrecognised")
                    .await?;
            }
            State::Malformed => self.reply(Status::ParameterError, detail).await?,
            State::Connect | State::RcptTo => self.reply(Status::Ok, "Ok").await?,
        }

        Ok(false)
    }

    /// Read the message body following `DATA` and hand it over.
    async fn receive_data(&mut self) -> Result<(), SessionError> {
        let max_message_size = self.config.max_message_size;

        match self.read_data().await? {
            Some(message) => {
                internal!(
                    level = DEBUG,
                    "Received {} byte message from {:?} for {:?}",
                    message.len(),
                    self.context.envelope.sender(),
                    self.context.envelope.recipients()
                );

                self.handler.handle(&message).await;

                let queue = self.queue.fetch_add(1, Ordering::Relaxed);
                self.reply(Status::Ok, format!("Ok: queued as {queue}"))
                    .await?;
            }
            None => {
                internal!(
                    level = WARN,
                    "Rejected message from {}: larger than {max_message_size} bytes",
                    self.peer
                );
                self.reply(
                    Status::ExceededStorage,
                    format!("Message exceeds maximum allowed size {max_message_size} bytes"),
                )
                .await?;
            }
        }

        self.context.reset();
        self.state = State::greeted(&self.context);

        Ok(())
    }

    /// Collect lines up to the lone `.` terminator, undoing dot-stuffing.
    /// Returns `None` if the message outgrew the size limit, in which case the
    /// rest of it is still consumed.
    async fn read_data(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let max_message_size = self.config.max_message_size;
        let line_limit = u64::try_from(max_message_size)
            .unwrap_or(u64::MAX)
            .saturating_add(3);

        let mut message = Vec::new();
        let mut oversized = false;
        let mut line = Vec::new();

        loop {
            line.clear();

            if self.read_line(&mut line, line_limit).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Connection closed before end of data",
                )
                .into());
            }

            if line == b".\r\n" || line == b".\n" {
                break;
            }

            if oversized {
                continue;
            }

            let content = line.strip_prefix(b".").unwrap_or(&line);

            if message.len().saturating_add(content.len()) > max_message_size {
                oversized = true;
                message = Vec::new();
            } else {
                message.extend_from_slice(content);
            }
        }

        Ok((!oversized).then_some(message))
    }

    /// Consume the remainder of a line that overran its read limit.
    async fn discard_line(&mut self) -> Result<(), SessionError> {
        let mut rest = Vec::new();

        loop {
            rest.clear();

            if self.read_line(&mut rest, COMMAND_LINE_LIMIT).await? == 0 || rest.ends_with(b"\n") {
                return Ok(());
            }
        }
    }

    async fn read_line(&mut self, buf: &mut Vec<u8>, limit: u64) -> Result<usize, SessionError> {
        let timeout = self.config.timeout;
        let read = tokio::time::timeout(
            timeout,
            (&mut self.stream).take(limit).read_until(b'\n', buf),
        )
        .await;

        if let Ok(read) = read {
            Ok(read?)
        } else {
            internal!(
                level = WARN,
                "Client {} timed out in state {}",
                self.peer,
                self.state
            );
            self.reply(Status::Unavailable, "Timeout, closing connection")
                .await?;
            Err(SessionError::Timeout(timeout.as_secs()))
        }
    }

    async fn reply<S: Display + Send>(&mut self, status: Status, text: S) -> Result<(), SessionError> {
        let response = format!("{status} {text}");
        outgoing!("{response}");

        self.stream
            .write_all(format!("{response}\r\n").as_bytes())
            .await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Write a multiline reply, `250-first` ... `250 last`.
    async fn reply_lines(&mut self, status: Status, lines: &[String]) -> Result<(), SessionError> {
        let mut response = String::new();

        for (idx, line) in lines.iter().enumerate() {
            let separator = if idx + 1 == lines.len() { ' ' } else { '-' };
            outgoing!("{status}{separator}{line}");
            response.push_str(&format!("{status}{separator}{line}\r\n"));
        }

        self.stream.write_all(response.as_bytes()).await?;
        self.stream.flush().await?;

        Ok(())
    }
}
