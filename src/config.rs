//! Configuration for a code fetch.
//!
//! Build a [`FetchConfig`] with [`FetchConfig::builder`] or load one from the
//! environment with [`FetchConfig::from_env`]:
//!
//! ```
//! use imap_otp::FetchConfig;
//!
//! let config = FetchConfig::builder()
//!     .host("imap.example.com")
//!     .username("user@example.com")
//!     .password("app-password")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.server_address(), "imap.example.com:993");
//! ```

use crate::error::{Error, Result};
use crate::protocol;
use crate::proxy::Socks5Proxy;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Default IMAPS port.
pub const DEFAULT_PORT: u16 = 993;

/// Default mailbox to read from.
pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Everything needed to connect to the mail server and find the code.
///
/// The password is held as a [`SecretString`] and redacted in `Debug` output.
#[derive(Clone)]
pub struct FetchConfig {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port (default: 993).
    pub port: u16,
    username: String,
    password: SecretString,
    /// Mailbox to select (default: `INBOX`).
    pub mailbox: String,
    /// Optional SOCKS5 proxy for the connection.
    pub proxy: Option<Socks5Proxy>,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// How the server certificate is checked.
    pub certificate_verification: CertificateVerification,
}

impl std::fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("mailbox", &self.mailbox)
            .field("proxy", &self.proxy)
            .field("timeouts", &self.timeouts)
            .field("certificate_verification", &self.certificate_verification)
            .finish()
    }
}

impl FetchConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }

    /// Loads the configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    ///
    /// | Variable | Required | Default |
    /// | --- | --- | --- |
    /// | `MAIL_HOST` | yes | |
    /// | `MAIL_USER` | yes | |
    /// | `MAIL_PASS` | yes | |
    /// | `MAIL_PORT` | no | `993` |
    /// | `MAIL_MAILBOX` | no | `INBOX` |
    /// | `MAIL_TLS_VERIFY` | no | `false` |
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::InvalidConfig {
                message: format!("{key} is not set"),
            })
        };

        let mut builder = Self::builder()
            .host(required("MAIL_HOST")?)
            .username(required("MAIL_USER")?)
            .password(required("MAIL_PASS")?);

        if let Some(port) = lookup("MAIL_PORT") {
            let port = port.trim().parse().map_err(|e| Error::InvalidConfig {
                message: format!("invalid MAIL_PORT: {e}"),
            })?;
            builder = builder.port(port);
        }

        if let Some(mailbox) = lookup("MAIL_MAILBOX") {
            builder = builder.mailbox(mailbox);
        }

        if let Some(verify) = lookup("MAIL_TLS_VERIFY") {
            let verification = match verify.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => CertificateVerification::WebPki,
                "0" | "false" | "no" => CertificateVerification::Relaxed,
                other => {
                    return Err(Error::InvalidConfig {
                        message: format!("invalid MAIL_TLS_VERIFY: {other}"),
                    })
                }
            };
            builder = builder.certificate_verification(verification);
        }

        builder.build()
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password as a string slice.
    ///
    /// The password is intentionally not a public field to keep it out of logs.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Server certificate verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateVerification {
    /// Accept any server certificate.
    ///
    /// Traffic is still encrypted, but the server is not authenticated. This is
    /// the default because the target servers' chains are often not verifiable
    /// from the runtime this crate is deployed in.
    #[default]
    Relaxed,
    /// Verify the chain against the bundled Mozilla root store.
    WebPki,
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for TCP connect, proxy negotiation and the TLS handshake.
    pub connect: Duration,
    /// Budget for the whole invocation, connection setup included.
    pub total: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            total: Duration::from_secs(25),
        }
    }
}

/// Builder for [`FetchConfig`].
#[derive(Debug, Default)]
pub struct FetchConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<SecretString>,
    mailbox: Option<String>,
    proxy: Option<Socks5Proxy>,
    timeouts: Option<TimeoutConfig>,
    certificate_verification: Option<CertificateVerification>,
}

impl FetchConfigBuilder {
    /// Sets the IMAP server hostname (required).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the IMAP server port.
    ///
    /// Default is 993 (IMAPS).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the login name (required).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password (required).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Sets the mailbox to read from.
    ///
    /// Default is `INBOX`.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = Some(mailbox.into());
        self
    }

    /// Routes the connection through a SOCKS5 proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection setup timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the budget for the whole invocation.
    #[must_use]
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .total = timeout;
        self
    }

    /// Sets the certificate verification mode.
    #[must_use]
    pub fn certificate_verification(mut self, verification: CertificateVerification) -> Self {
        self.certificate_verification = Some(verification);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a required field is missing or empty,
    /// the port is 0, an argument contains CR, LF or NUL, or the connect timeout
    /// exceeds the total timeout.
    pub fn build(self) -> Result<FetchConfig> {
        let host = require_non_empty("host", self.host)?;
        let username = require_non_empty("username", self.username)?;

        let password = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;
        if password.expose_secret().is_empty() {
            return Err(Error::InvalidConfig {
                message: "password must not be empty".into(),
            });
        }

        let mailbox = self.mailbox.unwrap_or_else(|| DEFAULT_MAILBOX.to_string());
        if mailbox.is_empty() {
            return Err(Error::InvalidConfig {
                message: "mailbox must not be empty".into(),
            });
        }

        for (field, value) in [
            ("username", username.as_str()),
            ("password", password.expose_secret()),
            ("mailbox", mailbox.as_str()),
        ] {
            if !protocol::is_transmittable(value) {
                return Err(Error::InvalidConfig {
                    message: format!("{field} must not contain CR, LF or NUL"),
                });
            }
        }

        let port = self.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(Error::InvalidConfig {
                message: "port must not be 0".into(),
            });
        }

        let timeouts = self.timeouts.unwrap_or_default();
        if timeouts.connect > timeouts.total {
            return Err(Error::InvalidConfig {
                message: "connect timeout must not exceed total timeout".into(),
            });
        }

        Ok(FetchConfig {
            host,
            port,
            username,
            password,
            mailbox,
            proxy: self.proxy,
            timeouts,
            certificate_verification: self.certificate_verification.unwrap_or_default(),
        })
    }
}

fn require_non_empty(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(Error::InvalidConfig {
            message: format!("{field} must not be empty"),
        }),
        None => Err(Error::InvalidConfig {
            message: format!("{field} is required"),
        }),
    }
}
