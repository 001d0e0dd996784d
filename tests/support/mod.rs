//! Shared helpers for the integration tests: a line based SMTP client, a
//! capturing writer and a canned-response HTTP server.
#![allow(dead_code)] // Not every test file uses every helper

use std::{
    collections::HashMap,
    io::Write,
    net::SocketAddr,
    sync::Arc,
};

use parking_lot::Mutex;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::broadcast,
    task::JoinHandle,
};

use smtp2gmail::{
    handler::MessageHandler,
    listener::Listener,
    smtp::session::SessionConfig,
    Signal,
};

/// A running listener bound to an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: broadcast::Sender<Signal>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start(handler: Arc<dyn MessageHandler>) -> Self {
        let listener = Listener::bind("127.0.0.1", 0, handler, SessionConfig::default())
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");

        let (shutdown, receiver) = broadcast::channel(4);
        let task = tokio::spawn(listener.serve(receiver));

        Self {
            addr,
            shutdown,
            task,
        }
    }

    pub async fn stop(self) {
        self.shutdown.send(Signal::Shutdown).expect("send shutdown");
        self.task
            .await
            .expect("listener task")
            .expect("listener result");
    }
}

/// Minimal SMTP client that reads complete (possibly multiline) replies.
pub struct SmtpClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl SmtpClient {
    /// Connect and consume the greeting, which is returned.
    pub async fn connect(addr: SocketAddr) -> (Self, String) {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
        };

        let greeting = client.reply().await;
        (client, greeting)
    }

    /// Read one reply, returning its final line.
    pub async fn reply(&mut self) -> String {
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).await.expect("read reply");
            assert!(read > 0, "connection closed while waiting for a reply");

            let line = line.trim_end().to_string();
            if line.as_bytes().get(3) != Some(&b'-') {
                return line;
            }
        }
    }

    pub async fn command(&mut self, command: &str) -> String {
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .expect("write command");
        self.reply().await
    }

    /// Run a whole transaction and return the reply to the final dot.
    pub async fn send(&mut self, from: &str, to: &[&str], message: &str) -> String {
        assert!(self.command("EHLO tester").await.starts_with("250"));
        assert!(self
            .command(&format!("MAIL FROM:<{from}>"))
            .await
            .starts_with("250"));
        for rcpt in to {
            assert!(self
                .command(&format!("RCPT TO:<{rcpt}>"))
                .await
                .starts_with("250"));
        }
        assert!(self.command("DATA").await.starts_with("354"));

        let mut data = String::new();
        for line in message.lines() {
            if line.starts_with('.') {
                data.push('.');
            }
            data.push_str(line);
            data.push_str("\r\n");
        }
        data.push_str(".\r\n");

        self.writer
            .write_all(data.as_bytes())
            .await
            .expect("write data");
        self.reply().await
    }

    pub async fn quit(mut self) -> String {
        self.command("QUIT").await
    }
}

/// A `Write` sink whose contents can be inspected after the fact.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One request seen by [`MockHttpServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

#[derive(Clone)]
struct CannedResponse {
    status: u16,
    body: String,
}

/// HTTP/1.1 server answering each path with a fixed JSON response, one
/// request per connection.
pub struct MockHttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

pub struct MockHttpServerBuilder {
    routes: HashMap<String, CannedResponse>,
}

impl MockHttpServerBuilder {
    pub fn route(mut self, path: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            path.to_string(),
            CannedResponse {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    pub async fn build(self) -> MockHttpServer {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock http server");
        let addr = listener.local_addr().expect("mock address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(self.routes);

        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = routes.clone();
                let recorded = recorded.clone();

                tokio::spawn(async move {
                    if let Some((request, stream)) = read_request(stream).await {
                        let response = routes.get(&request.path).cloned().unwrap_or(CannedResponse {
                            status: 404,
                            body: String::from(r#"{"error":"not_found"}"#),
                        });

                        // Record before answering so the client never sees a
                        // response for a request that is not yet listed
                        recorded.lock().push(request);
                        respond(stream, &response).await;
                    }
                });
            }
        });

        MockHttpServer {
            addr,
            requests,
            task,
        }
    }
}

impl MockHttpServer {
    pub fn builder() -> MockHttpServerBuilder {
        MockHttpServerBuilder {
            routes: HashMap::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request(stream: TcpStream) -> Option<(RecordedRequest, TcpStream)> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_default();
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await.ok()?;

    Some((
        RecordedRequest {
            method,
            path,
            headers,
            body,
        },
        reader.into_inner(),
    ))
}

async fn respond(mut stream: TcpStream, response: &CannedResponse) {
    let reply = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );

    if stream.write_all(reply.as_bytes()).await.is_ok() {
        let _ = stream.shutdown().await;
    }
}
