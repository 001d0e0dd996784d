use core::fmt::{self, Display};

/// Service extensions advertised in reply to `EHLO`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Extension {
    Size(usize),
    EightBitMime,
}

impl Display for Extension {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Size(size) => write!(fmt, "SIZE {size}"),
            Self::EightBitMime => fmt.write_str("8BITMIME"),
        }
    }
}
