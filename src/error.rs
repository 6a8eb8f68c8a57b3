//! Error types for the imap-otp crate.
//!
//! All errors implement [`std::error::Error`]. Display messages are safe to show
//! to end users: they never include credentials, server addresses or raw server
//! responses. Those details stay in the structured fields for logging.
//!
//! Not finding a code is not an error; it is reported as `Ok(None)`.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching a verification code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid DNS name for TLS.
    #[error("invalid server name for TLS")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Transport errors (RETRYABLE)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection.
    #[error("failed to connect to the mail server")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish a secure connection to the mail server")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect via SOCKS5 proxy.
    #[error("failed to connect to the mail server via SOCKS5 proxy")]
    Socks5Connect {
        /// The SOCKS5 proxy hostname.
        proxy_host: String,
        /// The target address.
        target: String,
        /// The underlying SOCKS5 error.
        #[source]
        source: tokio_socks::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Timeout errors (RETRYABLE)
    // ─────────────────────────────────────────────────────────────────────────
    /// Connection setup (TCP, proxy and TLS handshake) took too long.
    #[error("connection timeout after {timeout:?}")]
    ConnectTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The whole invocation exceeded its time budget.
    #[error("mail server did not complete the exchange within {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IMAP protocol errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The server rejected the LOGIN command.
    #[error("mail server rejected the credentials")]
    Authentication {
        /// The tagged response line sent by the server.
        response: String,
    },

    /// The server rejected the SELECT command.
    #[error("mailbox could not be selected")]
    MailboxSelect {
        /// The mailbox name.
        mailbox: String,
        /// The tagged response line sent by the server.
        response: String,
    },

    /// The server rejected the FETCH command.
    #[error("message {sequence} could not be fetched")]
    Fetch {
        /// The message sequence number that was requested.
        sequence: u32,
        /// The tagged response line sent by the server.
        response: String,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// The crate never retries on its own; this is a hint for the caller.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            // RETRYABLE errors: network, timeouts, fetch hiccups
            Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::Socks5Connect { .. }
            | Error::ConnectTimeout { .. }
            | Error::Timeout { .. }
            | Error::Fetch { .. } => true,

            // NOT retryable: the same request will be rejected again
            Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. }
            | Error::Authentication { .. }
            | Error::MailboxSelect { .. } => false,
        }
    }

    /// Returns the error category for status mapping and logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. } => ErrorCategory::Configuration,

            Error::InvalidDnsName { .. }
            | Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::Socks5Connect { .. } => ErrorCategory::Transport,

            Error::ConnectTimeout { .. } | Error::Timeout { .. } => ErrorCategory::Timeout,

            Error::Authentication { .. } => ErrorCategory::Authentication,
            Error::MailboxSelect { .. } => ErrorCategory::MailboxSelect,
            Error::Fetch { .. } => ErrorCategory::Fetch,
        }
    }
}

/// Error categories, one per distinct reportable failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Connection-level failure before any protocol error was detected.
    Transport,
    /// The invocation ran out of time.
    Timeout,
    /// Credentials rejected.
    Authentication,
    /// Mailbox inaccessible.
    MailboxSelect,
    /// Message retrieval rejected.
    Fetch,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Authentication => write!(f, "authentication"),
            ErrorCategory::MailboxSelect => write!(f, "mailbox_select"),
            ErrorCategory::Fetch => write!(f, "fetch"),
        }
    }
}
