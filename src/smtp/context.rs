use super::envelope::Envelope;

/// Protocol state carried across the commands of one session.
#[derive(Default, Debug)]
pub struct Context {
    /// Name the client gave in `EHLO`/`HELO`
    pub id: String,
    /// Whether the client greeted with `EHLO`
    pub extended: bool,
    pub envelope: Envelope,
    /// `SIZE` declared with `MAIL FROM`, if any
    pub declared_size: Option<usize>,
}

impl Context {
    /// Returns a reference to the id of this [`Context`].
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drop everything belonging to the current mail transaction, keeping the
    /// greeting.
    pub fn reset(&mut self) {
        self.envelope.clear();
        self.declared_size = None;
    }
}
