//! Async entry point: connect, run the session, close.
//!
//! [`CodeFetcher`] owns the configuration and the matcher. Each call to
//! [`CodeFetcher::fetch_latest_code`] opens its own TLS connection, feeds every
//! line through the [`Session`] state machine, writes the commands it asks for,
//! and shuts the connection down on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use imap_otp::{CodeFetcher, FetchConfig};
//!
//! # async fn example() -> imap_otp::Result<()> {
//! let config = FetchConfig::builder()
//!     .host("imap.example.com")
//!     .username("user@example.com")
//!     .password("app-password")
//!     .build()?;
//!
//! match CodeFetcher::new(config).fetch_latest_code().await? {
//!     Some(code) => println!("Got code: {code}"),
//!     None => println!("No code in the newest message"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::FetchConfig;
use crate::connection;
use crate::error::{Error, Result};
use crate::framer::LineFramer;
use crate::matcher::{Matcher, OtpMatcher};
use crate::session::{Session, SessionParams, Step};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Fetches the verification code from the newest message in a mailbox.
///
/// Create using [`CodeFetcher::new`]. The fetcher holds no connection between
/// calls, so it can be reused and shared freely.
pub struct CodeFetcher {
    config: FetchConfig,
    matcher: Box<dyn Matcher>,
}

impl CodeFetcher {
    /// Creates a fetcher that looks for a 6-digit code.
    #[must_use]
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            matcher: Box::new(OtpMatcher::six_digit()),
        }
    }

    /// Replaces the code matcher.
    ///
    /// # Example
    ///
    /// ```
    /// use imap_otp::{CodeFetcher, FetchConfig};
    /// use imap_otp::matcher::OtpMatcher;
    ///
    /// # fn example() -> imap_otp::Result<()> {
    /// # let config = FetchConfig::builder().host("h").username("u").password("p").build()?;
    /// let fetcher = CodeFetcher::new(config).with_matcher(OtpMatcher::n_digit(8));
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Logs in, selects the mailbox, fetches the newest message and extracts the code.
    ///
    /// Returns `Ok(None)` when the newest message has no code or the server
    /// closes the connection early.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`], [`Error::MailboxSelect`], [`Error::Fetch`]
    ///   when the server rejects the corresponding command
    /// - [`Error::TcpConnect`], [`Error::TlsConnect`], [`Error::Socks5Connect`],
    ///   [`Error::InvalidDnsName`] when the connection cannot be established
    /// - [`Error::ConnectTimeout`] or [`Error::Timeout`] when the configured
    ///   budgets run out
    #[instrument(
        name = "CodeFetcher::fetch_latest_code",
        skip_all,
        fields(
            imap_host = %self.config.host,
            port = self.config.port,
            mailbox = %self.config.mailbox,
            proxy_enabled = self.config.proxy.is_some(),
            matcher = %self.matcher.description()
        )
    )]
    pub async fn fetch_latest_code(&self) -> Result<Option<String>> {
        let total = self.config.timeouts.total;

        // Dropping the in-flight future on timeout drops, and so closes, the stream.
        let outcome = tokio::time::timeout(total, self.connect_and_run())
            .await
            .map_err(|_| Error::Timeout { timeout: total })?;

        match &outcome {
            Ok(code) => debug!(found = code.is_some(), "Fetch finished"),
            Err(e) => debug!(error = %e, category = %e.category(), "Fetch failed"),
        }
        outcome
    }

    async fn connect_and_run(&self) -> Result<Option<String>> {
        let config = &self.config;
        let connect_timeout = config.timeouts.connect;

        let tls_stream = tokio::time::timeout(
            connect_timeout,
            connection::establish_tls_connection(
                &config.host,
                config.port,
                config.proxy.as_ref(),
                config.certificate_verification,
            ),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            timeout: connect_timeout,
        })??;

        debug!("TLS connection established");

        let session = Session::new(SessionParams {
            username: config.username(),
            password: config.password(),
            mailbox: &config.mailbox,
            matcher: &*self.matcher,
        });

        run_session(tls_stream, session).await
    }
}

impl std::fmt::Debug for CodeFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeFetcher")
            .field("config", &self.config)
            .field("matcher", &self.matcher.description())
            .finish()
    }
}

/// Fetches the 6-digit code from the newest message using `config`.
///
/// Shorthand for `CodeFetcher::new(config.clone()).fetch_latest_code()`.
///
/// # Errors
///
/// See [`CodeFetcher::fetch_latest_code`].
pub async fn fetch_latest_code(config: &FetchConfig) -> Result<Option<String>> {
    CodeFetcher::new(config.clone()).fetch_latest_code().await
}

/// Drives `session` over `stream` until it produces an outcome or the stream ends.
///
/// The stream is shut down before returning, whatever the outcome.
pub(crate) async fn run_session<S>(mut stream: S, mut session: Session<'_>) -> Result<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framer = LineFramer::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    let outcome = 'exchange: loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) => {
                if let Some(line) = framer.finish() {
                    if let Some(outcome) = feed_line(&mut stream, &mut session, &line).await {
                        break 'exchange outcome;
                    }
                }
                break 'exchange session.on_close();
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, stage = ?session.stage(), "Read from server failed");
                break 'exchange session.on_close();
            }
        };

        for line in framer.push(&chunk[..n]) {
            if let Some(outcome) = feed_line(&mut stream, &mut session, &line).await {
                break 'exchange outcome;
            }
        }
    };

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Connection shutdown failed");
    }

    outcome
}

/// Feeds one line to the session, writing any command it emits.
///
/// Returns the outcome once the session is done or the write fails.
async fn feed_line<S>(
    stream: &mut S,
    session: &mut Session<'_>,
    line: &str,
) -> Option<Result<Option<String>>>
where
    S: AsyncWrite + Unpin,
{
    match session.on_line(line) {
        Step::Continue => None,
        Step::Send(command) => {
            debug!(tag = %command.tag(), command = command.name(), "Sending command");
            let written = async {
                stream.write_all(&command.encode()).await?;
                stream.flush().await
            }
            .await;

            match written {
                Ok(()) => None,
                Err(e) => {
                    warn!(error = %e, command = command.name(), "Write to server failed");
                    Some(session.on_close())
                }
            }
        }
        Step::Done(outcome) => Some(outcome),
    }
}
