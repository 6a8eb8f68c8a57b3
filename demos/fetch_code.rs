//! Fetch the verification code from the newest message in a mailbox.
//!
//! # Usage
//!
//! ```bash
//! export MAIL_HOST="imap.example.com"
//! export MAIL_USER="your@email.com"
//! export MAIL_PASS="your-app-password"
//! # Optional: MAIL_PORT, MAIL_MAILBOX, MAIL_TLS_VERIFY=true
//! export RUST_LOG=imap_otp=debug
//!
//! cargo run --example fetch_code
//! ```
//!
//! A `.env` file in the working directory is picked up as well.

use imap_otp::{fetch_latest_code, FetchConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> imap_otp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("imap_otp=info")),
        )
        .with_target(true)
        .init();

    let config = FetchConfig::from_env()?;

    println!("Checking {} on {}...", config.mailbox, config.server_address());

    match fetch_latest_code(&config).await {
        Ok(Some(code)) => println!("Got code: {code}"),
        Ok(None) => println!("No code in the newest message"),
        Err(e) => {
            eprintln!("Fetch failed [{}]: {e}", e.category());
            if e.is_retryable() {
                eprintln!("(this error is transient, retrying may help)");
            }
            return Err(e);
        }
    }

    Ok(())
}
