#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: Option<String>,
    recipients: Vec<String>,
}

impl Envelope {
    /// Returns the sender for this message, `None` for the null sender
    #[inline]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Returns a mutable reference to the [`Envelope`] sender for this message
    #[inline]
    pub fn sender_mut(&mut self) -> &mut Option<String> {
        &mut self.sender
    }

    /// Returns the recipients for this message, in the order given
    #[inline]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    #[inline]
    pub fn add_recipient(&mut self, recipient: String) {
        self.recipients.push(recipient);
    }

    /// Forget the current transaction
    pub fn clear(&mut self) {
        self.sender = None;
        self.recipients.clear();
    }
}
