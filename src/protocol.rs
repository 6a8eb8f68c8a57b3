//! The slice of the IMAP wire format this client speaks.
//!
//! Outgoing: `<tag> <COMMAND> <args>\r\n` for LOGIN, SELECT and FETCH.
//! Incoming: untagged lines (`* ...`), tagged completions (`<tag> <status> ...`)
//! and anything else, which callers treat as opaque data.

use secrecy::{ExposeSecret, SecretString};
use std::borrow::Cow;
use std::fmt;

/// Command tag, echoed by the server in the matching completion line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag(String);

impl Tag {
    /// Returns the tag as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out `A1`, `A2`, `A3`, ... in order.
#[derive(Debug)]
pub(crate) struct TagGenerator {
    next: u32,
}

impl TagGenerator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next_tag(&mut self) -> Tag {
        let tag = Tag(format!("A{}", self.next));
        self.next += 1;
        tag
    }
}

/// A client command ready to be written to the server.
#[derive(Debug, Clone)]
pub struct Command {
    tag: Tag,
    kind: CommandKind,
}

/// The three commands the session issues.
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// `LOGIN <username> <password>`
    Login {
        /// Account name.
        username: String,
        /// Account password, redacted in `Debug` output.
        password: SecretString,
    },
    /// `SELECT <mailbox>`
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// `FETCH <sequence> BODY[]`
    Fetch {
        /// Message sequence number.
        sequence: u32,
    },
}

impl Command {
    pub(crate) fn new(tag: Tag, kind: CommandKind) -> Self {
        Self { tag, kind }
    }

    /// Returns the command tag.
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Returns what the command does.
    #[must_use]
    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    /// Returns the command verb, safe to log.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.kind {
            CommandKind::Login { .. } => "LOGIN",
            CommandKind::Select { .. } => "SELECT",
            CommandKind::Fetch { .. } => "FETCH",
        }
    }

    /// Serializes the command, including the trailing CRLF.
    ///
    /// The result contains the password for LOGIN; never log it.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let line = match &self.kind {
            CommandKind::Login { username, password } => format!(
                "{} LOGIN {} {}\r\n",
                self.tag,
                astring(username),
                astring(password.expose_secret())
            ),
            CommandKind::Select { mailbox } => {
                format!("{} SELECT {}\r\n", self.tag, astring(mailbox))
            }
            CommandKind::Fetch { sequence } => {
                format!("{} FETCH {} BODY[]\r\n", self.tag, sequence)
            }
        };
        line.into_bytes()
    }
}

/// Encodes an argument as a bare atom when possible, otherwise as a quoted string.
///
/// Callers must reject CR, LF and NUL beforehand; see [`is_transmittable`].
fn astring(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && value.bytes().all(is_atom_char) {
        return Cow::Borrowed(value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

fn is_atom_char(b: u8) -> bool {
    b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\' | b']')
}

/// Returns `false` for values that cannot be sent as an atom or quoted string.
pub(crate) fn is_transmittable(value: &str) -> bool {
    !value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0'))
}

/// Completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`
    Ok,
    /// `NO`
    No,
    /// `BAD`
    Bad,
    /// Missing or unrecognized status word.
    Unknown,
}

impl Status {
    fn parse(word: &str) -> Self {
        if word.eq_ignore_ascii_case("OK") {
            Status::Ok
        } else if word.eq_ignore_ascii_case("NO") {
            Status::No
        } else if word.eq_ignore_ascii_case("BAD") {
            Status::Bad
        } else {
            Status::Unknown
        }
    }

    /// Returns `true` only for `OK`.
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// A classified server line, borrowing from the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    /// `* <rest>`; holds `rest` without the marker.
    Untagged(&'a str),
    /// `<tag> <status> <text>`
    Tagged {
        /// The echoed tag.
        tag: &'a str,
        /// The completion status.
        status: Status,
    },
    /// Anything else: literal data, continuation requests, blank lines.
    Data(&'a str),
}

impl<'a> Response<'a> {
    /// Classifies one line (without its terminator).
    #[must_use]
    pub fn parse(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix('*') {
            return Response::Untagged(rest.trim_start());
        }
        if line.is_empty() || line.starts_with(' ') || line.starts_with('+') {
            return Response::Data(line);
        }

        let mut words = line.split_whitespace();
        match words.next() {
            Some(tag) => Response::Tagged {
                tag,
                status: words.next().map_or(Status::Unknown, Status::parse),
            },
            None => Response::Data(line),
        }
    }

    /// Returns the status if this line completes the command tagged `tag`.
    #[must_use]
    pub fn completion_of(&self, tag: &Tag) -> Option<Status> {
        match self {
            Response::Tagged { tag: t, status } if *t == tag.as_str() => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for an untagged `* <n> EXISTS` line, whatever the size of `n`.
    #[must_use]
    pub fn is_exists(&self) -> bool {
        self.exists_words().is_some()
    }

    /// Returns `n` for an untagged `* <n> EXISTS` line.
    ///
    /// `None` also for an EXISTS line whose count does not fit in a `u32`; use
    /// [`Response::is_exists`] to tell the two apart.
    #[must_use]
    pub fn exists_count(&self) -> Option<u32> {
        self.exists_words()?.parse().ok()
    }

    fn exists_words(&self) -> Option<&'a str> {
        let Response::Untagged(rest) = *self else {
            return None;
        };
        let mut words = rest.split_whitespace();
        let count = words.next()?;
        let keyword = words.next()?;
        (count.bytes().all(|b| b.is_ascii_digit()) && keyword.eq_ignore_ascii_case("EXISTS"))
            .then_some(count)
    }
}
