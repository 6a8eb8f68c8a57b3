//! # imap-otp
//!
//! Fetches the newest message in an IMAP mailbox over TLS and extracts a
//! verification code from it.
//!
//! The IMAP client is deliberately minimal: three commands (LOGIN, SELECT,
//! FETCH), one connection per call, no protocol library. The exchange itself is
//! an I/O-free state machine ([`session::Session`]) driven line by line; the
//! async adapter in [`CodeFetcher`] wires it to a `tokio-rustls` stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use imap_otp::{fetch_latest_code, FetchConfig};
//!
//! # async fn example() -> imap_otp::Result<()> {
//! let config = FetchConfig::builder()
//!     .host("imap.example.com")
//!     .username("user@example.com")
//!     .password("app-password")
//!     .build()?;
//!
//! if let Some(code) = fetch_latest_code(&config).await? {
//!     println!("Got code: {code}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Outcomes
//!
//! - `Ok(Some(code))`: the newest message contains a 6-digit code
//! - `Ok(None)`: no code in the newest message, or the server hung up early
//! - `Err(_)`: credentials, mailbox or fetch rejected, connection failure, or
//!   timeout. An empty mailbox usually surfaces as a rejected fetch.
//!   [`Error::category`] gives a stable kind to map to a status code.
//!
//! ## Certificate verification
//!
//! By default the server certificate is **not** verified
//! ([`CertificateVerification::Relaxed`]); the connection is encrypted but the
//! server is not authenticated. Use [`CertificateVerification::WebPki`] when the
//! server presents a publicly trusted chain.
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Credentials are never recorded.
//!
//! - `CodeFetcher::fetch_latest_code` - one invocation
//! - `connection::establish_tls` - TCP/TLS setup
//! - `connection::socks5` - proxy negotiation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod error;
pub mod framer;
pub mod matcher;
pub mod protocol;
pub mod proxy;
pub mod session;

// Internal modules
mod client;
mod connection;

// Re-exports for ergonomic API
pub use client::{fetch_latest_code, CodeFetcher};
pub use config::{CertificateVerification, FetchConfig, FetchConfigBuilder, TimeoutConfig};
pub use error::{Error, ErrorCategory, Result};
pub use proxy::{ProxyAuth, Socks5Proxy};
