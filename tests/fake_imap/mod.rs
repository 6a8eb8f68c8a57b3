//! Scripted IMAP-over-TLS server for integration testing.
//!
//! The server binds `127.0.0.1:0`, presents a freshly generated self-signed
//! certificate, and answers LOGIN, SELECT and FETCH according to a [`Script`].
//! Every command line it receives is recorded so tests can assert on exactly
//! what the client sent. [`socks5`] adds a relay for proxied connections.

pub mod socks5;

use rcgen::{generate_simple_self_signed, CertifiedKey};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// How the fake server behaves for one connection.
#[derive(Debug, Clone)]
pub struct Script {
    /// Greeting line, or `None` to stay silent forever.
    pub greeting: Option<&'static str>,
    pub accept_login: bool,
    pub accept_select: bool,
    /// Reported as `* <n> EXISTS` during SELECT when set.
    pub exists: Option<u32>,
    /// Raw message returned for the FETCH, or `None` to reject it. An empty
    /// mailbox (`exists: Some(0)`) always rejects the FETCH.
    pub message: Option<String>,
    /// Hang up right after the LOGIN command arrives.
    pub hang_up_after_login: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: Some("* OK [CAPABILITY IMAP4rev1] Fake server ready"),
            accept_login: true,
            accept_select: true,
            exists: Some(1),
            message: Some(String::new()),
            hang_up_after_login: false,
        }
    }
}

impl Script {
    pub fn with_message(body: &str) -> Self {
        Self {
            message: Some(make_raw_email(body)),
            ..Self::default()
        }
    }
}

/// Builds a minimal RFC 5322 message around `body`.
pub fn make_raw_email(body: &str) -> String {
    format!(
        "From: no-reply@service.example\r\n\
         To: user@example.com\r\n\
         Subject: Your verification code\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {body}\r\n"
    )
}

pub struct FakeImapServer {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["127.0.0.1".to_string(), "localhost".to_string()])
                .expect("generate self-signed cert");

        let tls_config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(
                vec![rustls::Certificate(cert.der().to_vec())],
                rustls::PrivateKey(key_pair.serialize_der()),
            )
            .expect("build server TLS config");

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));
        let received = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let received = received.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _addr)) = listener.accept().await else {
                        break;
                    };
                    let acceptor = acceptor.clone();
                    let script = script.clone();
                    let received = received.clone();
                    tokio::spawn(async move {
                        // Handshake failures are expected in the strict-verification test
                        if let Ok(tls) = acceptor.accept(stream).await {
                            handle_session(tls, &script, &received).await;
                        }
                    });
                }
            })
        };

        Self {
            port,
            received,
            _handle: handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Command lines received so far, without CRLF.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

async fn handle_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    script: &Script,
    received: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream);

    let Some(greeting) = script.greeting else {
        // Keep the connection open without ever speaking
        std::future::pending::<()>().await;
        return;
    };
    if write(&mut reader, &format!("{greeting}\r\n")).await.is_err() {
        return;
    }

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim_end().to_string();
        received.lock().unwrap().push(line.clone());

        let mut words = line.split_whitespace();
        let tag = words.next().unwrap_or("*").to_string();
        let command = words.next().unwrap_or("").to_ascii_uppercase();

        let response = match command.as_str() {
            "LOGIN" if script.hang_up_after_login => break,
            "LOGIN" if script.accept_login => format!("{tag} OK LOGIN completed\r\n"),
            "LOGIN" => format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n"),
            "SELECT" if script.accept_select => {
                let mut out = String::from("* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n");
                if let Some(exists) = script.exists {
                    out.push_str(&format!("* {exists} EXISTS\r\n"));
                }
                out.push_str("* 0 RECENT\r\n* OK [UIDVALIDITY 1] UIDs valid\r\n");
                out.push_str(&format!("{tag} OK [READ-WRITE] SELECT completed\r\n"));
                out
            }
            "SELECT" => format!("{tag} NO Mailbox does not exist\r\n"),
            "FETCH" if script.exists == Some(0) => {
                format!("{tag} NO Invalid message sequence number\r\n")
            }
            "FETCH" => match &script.message {
                Some(message) => {
                    let sequence = words.next().unwrap_or("1");
                    format!(
                        "* {sequence} FETCH (BODY[] {{{}}}\r\n{message})\r\n{tag} OK FETCH completed\r\n",
                        message.len()
                    )
                }
                None => format!("{tag} NO FETCH failed\r\n"),
            },
            _ => format!("{tag} BAD Unknown command\r\n"),
        };

        if write(&mut reader, &response).await.is_err() {
            break;
        }
    }
}

async fn write<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    data: &str,
) -> std::io::Result<()> {
    stream.get_mut().write_all(data.as_bytes()).await?;
    stream.get_mut().flush().await
}
