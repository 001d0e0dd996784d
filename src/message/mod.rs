//! Parsed view over a received message.

pub mod mime;

use mailparse::MailHeaderMap;

use crate::error::MessageError;

pub use mime::{decode_text, extract, extract_all, BodyPart, ExtractedBody};

/// Headers and body tree of one inbound message.
///
/// Built once per message from the raw DATA payload and dropped when the
/// handler returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedMessage {
    sender: String,
    to: String,
    cc: Option<String>,
    bcc: Option<String>,
    subject: String,
    root: BodyPart,
}

impl ParsedMessage {
    /// Parse a complete RFC 5322 message.
    ///
    /// # Errors
    ///
    /// Returns an error if the header block cannot be parsed at all. Problems
    /// confined to individual body parts are recorded on the part instead.
    pub fn parse(raw: &[u8]) -> Result<Self, MessageError> {
        let mail = mailparse::parse_mail(raw)?;
        let headers = &mail.headers;

        Ok(Self {
            sender: headers
                .get_first_value("From")
                .unwrap_or_else(|| String::from("Unknown")),
            to: headers.get_first_value("To").unwrap_or_default(),
            cc: headers.get_first_value("CC"),
            // Relays normally strip this before it reaches us
            bcc: headers.get_first_value("BCC"),
            subject: headers
                .get_first_value("Subject")
                .unwrap_or_else(|| String::from("No Subject")),
            root: BodyPart::from(&mail),
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Primary recipients exactly as they appear in the `To` header
    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn cc(&self) -> Option<&str> {
        self.cc.as_deref()
    }

    pub fn bcc(&self) -> Option<&str> {
        self.bcc.as_deref()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn cc_list(&self) -> Vec<String> {
        split_recipients(self.cc())
    }

    pub fn bcc_list(&self) -> Vec<String> {
        split_recipients(self.bcc())
    }

    pub const fn is_multipart(&self) -> bool {
        self.root.is_container()
    }

    pub const fn root(&self) -> &BodyPart {
        &self.root
    }

    /// Top level body parts, or the message itself when it is not multipart.
    pub fn parts(&self) -> &[BodyPart] {
        match &self.root {
            BodyPart::Container { children } => children,
            leaf @ BodyPart::Leaf { .. } => std::slice::from_ref(leaf),
        }
    }

    /// Whole body of a non-multipart message as text, regardless of its
    /// declared content type.
    pub fn body_text(&self) -> Option<String> {
        match &self.root {
            BodyPart::Leaf {
                payload: Ok(bytes), ..
            } => Some(decode_text(bytes)),
            _ => None,
        }
    }
}

/// Split a recipient header on commas, trimming each address and dropping
/// empty entries. A missing header gives an empty list.
pub fn split_recipients(header: Option<&str>) -> Vec<String> {
    header
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
