use std::io::{self, Write};

use parking_lot::Mutex;

use crate::{
    internal,
    message::{extract_all, ExtractedBody, ParsedMessage},
};

use super::MessageHandler;

const RULE_WIDTH: usize = 60;

/// Writes a human readable summary of every message to a sink, standard
/// output unless told otherwise.
pub struct LoggingHandler {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl LoggingHandler {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Mutex::new(Box::new(writer)),
        }
    }

    fn write(&self, report: &str) -> io::Result<()> {
        let mut sink = self.sink.lock();
        sink.write_all(report.as_bytes())?;
        sink.flush()
    }
}

impl Default for LoggingHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn recipients(label: &str, list: &[String], none: &str, lines: &mut Vec<String>) {
    if list.is_empty() {
        lines.push(format!("{label} Recipients: {none}"));
    } else {
        lines.push(format!("{label} Recipients ({}):", list.len()));
        lines.extend(
            list.iter()
                .enumerate()
                .map(|(idx, addr)| format!("  {}. {addr}", idx + 1)),
        );
    }
}

/// Render the summary printed for `message`.
///
/// A message that is not multipart has its whole body reported as HTML,
/// whatever its declared content type.
pub fn report(message: &ParsedMessage) -> String {
    let rule = "=".repeat(RULE_WIDTH);

    let mut lines = vec![
        String::new(),
        rule.clone(),
        String::from("New Email Received"),
        rule.clone(),
        format!("From: {}", message.sender()),
        format!("Subject: {}", message.subject()),
        format!("To: {}", message.to()),
    ];

    recipients("CC", &message.cc_list(), "None", &mut lines);
    recipients(
        "BCC",
        &message.bcc_list(),
        "None (typically stripped by mail servers)",
        &mut lines,
    );
    lines.push(rule);

    let body = if message.is_multipart() {
        lines.push(format!(
            "Root message is multipart with {} parts",
            message.parts().len()
        ));
        extract_all(message.parts())
    } else {
        ExtractedBody {
            plain: None,
            html: message.body_text(),
        }
    };

    if let Some(plain) = body.plain.filter(|plain| !plain.is_empty()) {
        lines.push(format!("Plain Message: {plain}"));
    }

    if let Some(html) = body.html.filter(|html| !html.is_empty()) {
        lines.push(format!("HTML Message: {html}"));
    }

    lines.push(String::from("\n"));

    lines.join("\n")
}

#[async_trait::async_trait]
impl MessageHandler for LoggingHandler {
    fn name(&self) -> &'static str {
        "print_handler"
    }

    async fn handle(&self, raw: &[u8]) {
        let message = match ParsedMessage::parse(raw) {
            Ok(message) => message,
            Err(err) => {
                internal!(level = ERROR, "Error processing message: {err}");
                return;
            }
        };

        if let Err(err) = self.write(&report(&message)) {
            internal!(level = ERROR, "Unable to write message report: {err}");
        }
    }
}
