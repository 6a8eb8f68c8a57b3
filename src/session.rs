//! The IMAP exchange as an I/O-free state machine.
//!
//! A [`Session`] is fed one server line at a time through [`Session::on_line`]
//! and answers with a [`Step`]: keep reading, send a command, or stop with an
//! outcome. It never touches a socket, which keeps the protocol logic testable
//! line by line; `client` drives it over a real connection.
//!
//! ```text
//! AwaitingGreeting --* ...--> AwaitingAuth --A1 OK--> AwaitingSelect --A2 OK--> AwaitingFetch --A3 OK--> Finished
//!                                  |                        |                         |
//!                               A1 NO/BAD               A2 NO/BAD                 A3 NO/BAD
//!                                  v                        v                         v
//!                         Error::Authentication   Error::MailboxSelect           Error::Fetch
//! ```

use crate::error::{Error, Result};
use crate::matcher::Matcher;
use crate::protocol::{Command, CommandKind, Response, Tag, TagGenerator};
use secrecy::SecretString;
use std::borrow::Cow;
use tracing::{debug, warn};

/// Position of the session in the exchange. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Connected, waiting for the server greeting.
    AwaitingGreeting,
    /// LOGIN sent.
    AwaitingAuth,
    /// SELECT sent.
    AwaitingSelect,
    /// FETCH sent, collecting the message.
    AwaitingFetch,
    /// An outcome was produced; further input is ignored.
    Finished,
}

/// What the driver must do after feeding a line.
#[derive(Debug)]
pub enum Step {
    /// Nothing to send; read the next line.
    Continue,
    /// Write this command, then keep reading.
    Send(Command),
    /// The exchange is over. Close the connection and report this outcome.
    Done(Result<Option<String>>),
}

/// Inputs borrowed by a [`Session`] for its lifetime.
pub struct SessionParams<'a> {
    /// Login name.
    pub username: &'a str,
    /// Login password.
    pub password: &'a str,
    /// Mailbox to select.
    pub mailbox: &'a str,
    /// Extraction applied to the fetched message.
    pub matcher: &'a dyn Matcher,
}

/// Single-use client state machine for one LOGIN, SELECT, FETCH exchange.
pub struct Session<'a> {
    params: SessionParams<'a>,
    stage: Stage,
    tags: TagGenerator,
    pending: Option<Tag>,
    exists_count: Option<u32>,
    fetch_sequence: u32,
    message_buffer: String,
}

impl<'a> Session<'a> {
    /// Creates a session in [`Stage::AwaitingGreeting`].
    #[must_use]
    pub fn new(params: SessionParams<'a>) -> Self {
        Self {
            params,
            stage: Stage::AwaitingGreeting,
            tags: TagGenerator::new(),
            pending: None,
            exists_count: None,
            fetch_sequence: 0,
            message_buffer: String::new(),
        }
    }

    /// Returns the current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the message count reported while selecting, if any.
    #[must_use]
    pub fn exists_count(&self) -> Option<u32> {
        self.exists_count
    }

    /// Advances the state machine by one server line (terminator stripped).
    pub fn on_line(&mut self, line: &str) -> Step {
        let response = Response::parse(line);

        match self.stage {
            Stage::AwaitingGreeting => match response {
                Response::Untagged(_) => {
                    debug!("Greeting received, logging in");
                    let password = SecretString::from(self.params.password.to_owned());
                    self.send(
                        Stage::AwaitingAuth,
                        CommandKind::Login {
                            username: self.params.username.to_owned(),
                            password,
                        },
                    )
                }
                _ => Step::Continue,
            },

            Stage::AwaitingAuth => match self.completion(&response) {
                None => Step::Continue,
                Some(true) => {
                    debug!(mailbox = %self.params.mailbox, "Authenticated, selecting mailbox");
                    self.send(
                        Stage::AwaitingSelect,
                        CommandKind::Select {
                            mailbox: self.params.mailbox.to_owned(),
                        },
                    )
                }
                Some(false) => self.fail(Error::Authentication {
                    response: line.to_owned(),
                }),
            },

            Stage::AwaitingSelect => {
                if response.is_exists() {
                    self.exists_count = response.exists_count();
                    match self.exists_count {
                        Some(count) => debug!(count, "Mailbox reported message count"),
                        None => warn!(line, "Message count out of range, treating it as unknown"),
                    }
                    return Step::Continue;
                }

                match self.completion(&response) {
                    None => Step::Continue,
                    Some(true) => self.fetch_newest(),
                    Some(false) => self.fail(Error::MailboxSelect {
                        mailbox: self.params.mailbox.to_owned(),
                        response: line.to_owned(),
                    }),
                }
            }

            Stage::AwaitingFetch => match self.completion(&response) {
                None => {
                    self.message_buffer.push_str(line);
                    self.message_buffer.push('\n');
                    Step::Continue
                }
                Some(true) => {
                    let code = self
                        .params
                        .matcher
                        .find_match(&self.message_buffer)
                        .map(Cow::into_owned);
                    debug!(
                        matcher = %self.params.matcher.description(),
                        message_len = self.message_buffer.len(),
                        found = code.is_some(),
                        "Message fetched"
                    );
                    self.finish(Ok(code))
                }
                Some(false) => self.fail(Error::Fetch {
                    sequence: self.fetch_sequence,
                    response: line.to_owned(),
                }),
            },

            Stage::Finished => Step::Continue,
        }
    }

    /// Reports that the connection ended before an outcome was produced.
    ///
    /// A mailbox without a matching message is an expected situation, so a
    /// premature end resolves with no code rather than an error.
    pub fn on_close(&mut self) -> Result<Option<String>> {
        if self.stage != Stage::Finished {
            debug!(stage = ?self.stage, "Connection ended before the exchange completed");
            self.stage = Stage::Finished;
        }
        Ok(None)
    }

    /// Picks the sequence number of the newest message and issues the FETCH.
    fn fetch_newest(&mut self) -> Step {
        let sequence = match self.exists_count {
            Some(count) if count > 0 => count,
            Some(_) => {
                debug!(
                    mailbox = %self.params.mailbox,
                    "Mailbox reported no messages, fetching message 1"
                );
                1
            }
            None => {
                warn!(
                    mailbox = %self.params.mailbox,
                    "Message count unknown, fetching message 1"
                );
                1
            }
        };

        debug!(sequence, "Fetching newest message");
        self.fetch_sequence = sequence;
        self.send(Stage::AwaitingFetch, CommandKind::Fetch { sequence })
    }

    /// Returns whether `response` completes the outstanding command, and if so
    /// whether it succeeded.
    fn completion(&self, response: &Response<'_>) -> Option<bool> {
        let tag = self.pending.as_ref()?;
        response.completion_of(tag).map(|status| status.is_ok())
    }

    fn send(&mut self, next: Stage, kind: CommandKind) -> Step {
        let tag = self.tags.next_tag();
        self.pending = Some(tag.clone());
        self.stage = next;
        Step::Send(Command::new(tag, kind))
    }

    fn fail(&mut self, error: Error) -> Step {
        debug!(stage = ?self.stage, category = %error.category(), "Server rejected command");
        self.finish(Err(error))
    }

    fn finish(&mut self, outcome: Result<Option<String>>) -> Step {
        self.stage = Stage::Finished;
        self.pending = None;
        Step::Done(outcome)
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stage", &self.stage)
            .field("pending", &self.pending)
            .field("exists_count", &self.exists_count)
            .field("buffered", &self.message_buffer.len())
            .finish_non_exhaustive()
    }
}
