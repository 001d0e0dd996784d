pub mod command;
pub mod context;
pub mod envelope;
pub mod extensions;
pub mod session;
pub mod status;

use core::fmt::{self, Display, Formatter};

use crate::traits::fsm::FiniteStateMachine;

use self::{
    command::{Command, HeloVariant},
    context::Context,
};

#[derive(PartialEq, PartialOrd, Eq, Hash, Debug, Clone, Copy, Default)]
pub enum State {
    #[default]
    Connect,
    Ehlo,
    Helo,
    MailFrom,
    RcptTo,
    Data,
    Quit,
    /// A known command arrived out of order. The session stays where it was.
    InvalidCommandSequence,
    /// The command was not recognised. The session stays where it was.
    Invalid,
    /// The command was recognised but its arguments were not. The session
    /// stays where it was.
    Malformed,
}

impl State {
    /// States that only describe the reply to a rejected command
    #[must_use]
    pub const fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::InvalidCommandSequence | Self::Invalid | Self::Malformed
        )
    }

    /// The state a session returns to once a transaction ends
    #[must_use]
    pub const fn greeted(context: &Context) -> Self {
        if context.extended {
            Self::Ehlo
        } else {
            Self::Helo
        }
    }
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Connect => "Connect",
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL",
            Self::RcptTo => "RCPT",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
            Self::Invalid => "INVALID",
            Self::Malformed => "MALFORMED",
            Self::InvalidCommandSequence => "Invalid Command Sequence",
        })
    }
}

impl FiniteStateMachine for State {
    type Input = Command;
    type Context = Context;

    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self {
        match (self, input) {
            (_, Command::Quit) => Self::Quit,
            (_, Command::Invalid(_)) => Self::Invalid,
            (_, Command::Malformed(_)) => Self::Malformed,
            (_, Command::Helo(HeloVariant::Ehlo(id))) => {
                context.id = id;
                context.extended = true;
                context.reset();
                Self::Ehlo
            }
            (_, Command::Helo(HeloVariant::Helo(id))) => {
                context.id = id;
                context.extended = false;
                context.reset();
                Self::Helo
            }
            (Self::Ehlo | Self::Helo, Command::MailFrom(from, size)) => {
                context.reset();
                *context.envelope.sender_mut() = from;
                context.declared_size = size;
                Self::MailFrom
            }
            (Self::MailFrom | Self::RcptTo, Command::RcptTo(to)) => {
                context.envelope.add_recipient(to);
                Self::RcptTo
            }
            (Self::RcptTo, Command::Data) => Self::Data,
            (Self::Connect, Command::Rset) => Self::Connect,
            (_, Command::Rset) => {
                context.reset();
                Self::greeted(context)
            }
            (state, Command::Noop) => state,
            _ => Self::InvalidCommandSequence,
        }
    }
}
