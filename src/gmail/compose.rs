//! Serialise an [`OutgoingMessage`] into the RFC 5322 form the API expects.

use base64::Engine;
use mail_builder::{headers::address::Address, MessageBuilder};
use mailparse::MailAddr;

use super::OutgoingMessage;

/// Turn one header value into builder addresses, keeping display names.
/// Values that do not parse as addresses are passed through as-is.
fn addresses(value: &str) -> Vec<Address<'static>> {
    let value = value.trim();
    if value.is_empty() {
        return Vec::new();
    }

    match mailparse::addrparse(value) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(single) => vec![single.clone()],
                MailAddr::Group(group) => group.addrs.clone(),
            })
            .map(|single| Address::new_address(single.display_name, single.addr))
            .collect(),
        Err(_) => vec![Address::new_address(None::<String>, value.to_string())],
    }
}

fn address_list<'a>(values: impl IntoIterator<Item = &'a String>) -> Vec<Address<'static>> {
    values
        .into_iter()
        .flat_map(|value| addresses(value.as_str()))
        .collect()
}

/// Build the raw message bytes.
///
/// # Errors
///
/// Returns an error if the builder fails to write the message.
pub fn compose(message: &OutgoingMessage) -> std::io::Result<Vec<u8>> {
    let mut builder = MessageBuilder::new().subject(message.subject.clone());

    if let Some(sender) = addresses(&message.sender).into_iter().next() {
        builder = builder.from(sender);
    }

    let to = addresses(&message.to);
    if !to.is_empty() {
        builder = builder.to(Address::new_list(to));
    }

    let cc = address_list(&message.cc);
    if !cc.is_empty() {
        builder = builder.cc(Address::new_list(cc));
    }

    let bcc = address_list(&message.bcc);
    if !bcc.is_empty() {
        builder = builder.bcc(Address::new_list(bcc));
    }

    if !message.msg_plain.is_empty() || message.msg_html.is_empty() {
        builder = builder.text_body(message.msg_plain.clone());
    }

    if !message.msg_html.is_empty() {
        builder = builder.html_body(message.msg_html.clone());
    }

    builder.write_to_vec()
}

/// URL-safe base64 of the raw message, the encoding of the `raw` field.
pub fn encode_raw(raw: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(raw)
}
