use crate::{
    gmail::{MailApi, OutgoingMessage},
    internal,
    message::{extract, ParsedMessage},
};

use super::MessageHandler;

/// Re-sends every message through a [`MailApi`].
pub struct ForwardingHandler<Api: MailApi> {
    api: Api,
}

impl<Api: MailApi> ForwardingHandler<Api> {
    pub const fn new(api: Api) -> Self {
        Self { api }
    }

    pub const fn api(&self) -> &Api {
        &self.api
    }
}

/// Map a received message onto the fields the API sends. Bodies that could
/// not be found are sent empty.
pub fn outgoing_message(message: &ParsedMessage) -> OutgoingMessage {
    let body = extract(message.root());

    OutgoingMessage {
        to: message.to().to_string(),
        sender: message.sender().to_string(),
        cc: message.cc_list(),
        bcc: message.bcc_list(),
        subject: message.subject().to_string(),
        msg_plain: body.plain.unwrap_or_default(),
        msg_html: body.html.unwrap_or_default(),
        signature: false,
    }
}

#[async_trait::async_trait]
impl<Api: MailApi + 'static> MessageHandler for ForwardingHandler<Api> {
    fn name(&self) -> &'static str {
        "gmail_proxy_handler"
    }

    async fn handle(&self, raw: &[u8]) {
        let message = match ParsedMessage::parse(raw) {
            Ok(message) => message,
            Err(err) => {
                internal!(level = ERROR, "Error processing message: {err}");
                return;
            }
        };

        let outgoing = outgoing_message(&message);

        match self.api.send_message(&outgoing).await {
            Ok(sent) => internal!(
                level = INFO,
                "Forwarded message from {} to {} as {}",
                outgoing.sender,
                outgoing.to,
                sent.id
            ),
            Err(err) if err.is_auth() => internal!(
                level = ERROR,
                "Unable to forward message from {}, check the Gmail credentials: {err}",
                outgoing.sender
            ),
            Err(err) => internal!(
                level = ERROR,
                "Unable to forward message from {}: {err}",
                outgoing.sender
            ),
        }
    }
}
