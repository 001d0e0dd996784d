//! MIME body-part tree and the text body extraction walk.

use mailparse::ParsedMail;

use crate::internal;

/// A node in a message body tree.
///
/// Containers only ever hold children; leaves only ever hold content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyPart {
    Container {
        children: Vec<BodyPart>,
    },
    Leaf {
        /// Lowercased MIME type without parameters, e.g. `text/plain`
        content_type: String,
        /// Payload with the transfer encoding removed, or the reason it could
        /// not be removed
        payload: Result<Vec<u8>, String>,
    },
}

impl BodyPart {
    /// Convenience constructor for a leaf whose payload decoded successfully.
    pub fn leaf(content_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::Leaf {
            content_type: content_type.into().to_ascii_lowercase(),
            payload: Ok(payload.into()),
        }
    }

    pub const fn container(children: Vec<Self>) -> Self {
        Self::Container { children }
    }

    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Container { .. })
    }
}

impl From<&ParsedMail<'_>> for BodyPart {
    fn from(mail: &ParsedMail<'_>) -> Self {
        let content_type = mail.ctype.mimetype.to_ascii_lowercase();

        if content_type.starts_with("multipart/") {
            Self::Container {
                children: mail.subparts.iter().map(Self::from).collect(),
            }
        } else {
            Self::Leaf {
                payload: mail.get_body_raw().map_err(|err| err.to_string()),
                content_type,
            }
        }
    }
}

/// The first plain-text and first HTML bodies found in a body tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedBody {
    pub plain: Option<String>,
    pub html: Option<String>,
}

impl ExtractedBody {
    /// Both kinds of body have been found, so nothing later can contribute.
    pub const fn is_complete(&self) -> bool {
        self.plain.is_some() && self.html.is_some()
    }

    fn collect(&mut self, part: &BodyPart) {
        match part {
            BodyPart::Container { children } => {
                for child in children {
                    if self.is_complete() {
                        break;
                    }

                    self.collect(child);
                }
            }
            BodyPart::Leaf {
                content_type,
                payload,
            } => match payload {
                Ok(bytes) => {
                    if !content_type.starts_with("text") {
                        return;
                    }

                    let slot = match content_type.as_str() {
                        "text/plain" => &mut self.plain,
                        "text/html" => &mut self.html,
                        _ => return,
                    };

                    if slot.is_none() {
                        *slot = Some(decode_text(bytes));
                    }
                }
                Err(err) => {
                    internal!(
                        level = WARN,
                        "Unable to read {content_type} part, skipping it: {err}"
                    );
                }
            },
        }
    }
}

/// Decode bytes as UTF-8, replacing invalid sequences rather than failing.
pub fn decode_text(bytes: &[u8]) -> String {
    encoding_rs::UTF_8
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}

/// Walk `part` depth first, left to right, keeping the earliest `text/plain`
/// and `text/html` payloads.
pub fn extract(part: &BodyPart) -> ExtractedBody {
    let mut body = ExtractedBody::default();
    body.collect(part);
    body
}

/// [`extract`] over a sequence of sibling parts.
pub fn extract_all(parts: &[BodyPart]) -> ExtractedBody {
    let mut body = ExtractedBody::default();

    for part in parts {
        if body.is_complete() {
            break;
        }

        body.collect(part);
    }

    body
}
