use core::fmt::{self, Display, Formatter};

use mailparse::MailAddr;

#[derive(Clone, PartialEq, PartialOrd, Eq, Hash, Debug)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl Display for HeloVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Command {
    Helo(HeloVariant),
    /// A `None` sender is the `null reverse-path` from
    /// [RFC-5321](https://www.ietf.org/rfc/rfc5321.txt). The second field is
    /// the declared `SIZE` parameter, if any.
    MailFrom(Option<String>, Option<usize>),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    /// Not a command this server knows
    Invalid(String),
    /// A known command whose arguments could not be understood
    Malformed(String),
}

impl Command {
    #[must_use]
    pub fn inner(&self) -> &str {
        match self {
            Self::MailFrom(from, _) => from.as_deref().unwrap_or_default(),
            Self::RcptTo(to) => to,
            Self::Invalid(command) | Self::Malformed(command) => command,
            Self::Helo(HeloVariant::Ehlo(id) | HeloVariant::Helo(id)) => id,
            _ => "",
        }
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(v) => write!(fmt, "{v} {}", self.inner()),
            Self::MailFrom(_, _) => write!(fmt, "MAIL FROM:<{}>", self.inner()),
            Self::RcptTo(rcpt) => write!(fmt, "RCPT TO:<{rcpt}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(s) | Self::Malformed(s) => fmt.write_str(s),
        }
    }
}

/// Split `<path> PARAMS` into the path (without brackets) and the parameters.
fn split_path(args: &str) -> Result<(&str, &str), String> {
    let args = args.trim();

    if let Some(rest) = args.strip_prefix('<') {
        let end = rest
            .find('>')
            .ok_or_else(|| format!("Unterminated path in '{args}'"))?;
        Ok((rest[..end].trim(), rest[end + 1..].trim()))
    } else {
        Ok(args
            .split_once(char::is_whitespace)
            .map_or((args, ""), |(path, params)| (path.trim(), params.trim())))
    }
}

fn parse_address(path: &str) -> Result<String, String> {
    if path.eq_ignore_ascii_case("postmaster") {
        return Ok(path.to_string());
    }

    match mailparse::addrparse(path) {
        Ok(list) => match list.first() {
            Some(MailAddr::Single(single)) if single.addr.contains('@') => Ok(single.addr.clone()),
            _ => Err(format!("Invalid address '{path}'")),
        },
        Err(err) => Err(format!("Invalid address '{path}': {err}")),
    }
}

fn parse_size(params: &str) -> Result<Option<usize>, String> {
    params
        .split_whitespace()
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("SIZE"))
        .map(|(_, value)| {
            value
                .parse::<usize>()
                .map_err(|_| format!("Invalid SIZE value: {value}"))
        })
        .transpose()
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let command = command.trim_end_matches(['\r', '\n']);
        let comm = command.to_ascii_uppercase();
        let comm = comm.trim();

        if comm.starts_with("MAIL FROM:") {
            let start = command.len() - command.trim_start().len() + "MAIL FROM:".len();
            let (path, params) = split_path(&command[start..]).map_err(Self::Malformed)?;
            let size = parse_size(params).map_err(Self::Malformed)?;

            // Handle the NULL sender explicitly, as mailparse doesn't tend to like it
            if path.is_empty() {
                return Ok(Self::MailFrom(None, size));
            }

            parse_address(path)
                .map(|from| Self::MailFrom(Some(from), size))
                .map_err(Self::Malformed)
        } else if comm.starts_with("RCPT TO:") {
            let start = command.len() - command.trim_start().len() + "RCPT TO:".len();
            let (path, _) = split_path(&command[start..]).map_err(Self::Malformed)?;

            if path.is_empty() {
                return Err(Self::Malformed(format!("Expected recipient in {comm}")));
            }

            parse_address(path)
                .map(Self::RcptTo)
                .map_err(Self::Malformed)
        } else if comm.starts_with("MAIL") || comm.starts_with("RCPT") {
            Err(Self::Malformed(format!("Invalid syntax in {comm}")))
        } else if comm.starts_with("EHLO") || comm.starts_with("HELO") {
            match command.trim().split_once(' ') {
                None => Err(Self::Malformed(format!("Expected hostname in {comm}"))),
                Some((_, host)) if comm.starts_with('H') => {
                    Ok(Self::Helo(HeloVariant::Helo(host.trim().to_string())))
                }
                Some((_, host)) => Ok(Self::Helo(HeloVariant::Ehlo(host.trim().to_string()))),
            }
        } else {
            match comm.split_whitespace().next().unwrap_or_default() {
                "DATA" => Ok(Self::Data),
                "RSET" => Ok(Self::Rset),
                "NOOP" => Ok(Self::Noop),
                "QUIT" => Ok(Self::Quit),
                _ => Err(Self::Invalid(command.to_owned())),
            }
        }
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Self;

    fn try_from(command: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(command).map_or(
            Err(Self::Invalid("Unable to interpret command".to_string())),
            Self::try_from,
        )
    }
}

impl TryFrom<String> for Command {
    type Error = Self;

    fn try_from(command: String) -> Result<Self, Self::Error> {
        Self::try_from(command.as_str())
    }
}
