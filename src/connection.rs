//! Internal module for establishing TLS connections to the mail server.
//!
//! Supports both direct connections and SOCKS5 proxy connections, with the
//! server certificate either verified against the web PKI or accepted as is.

use crate::config::CertificateVerification;
use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_socks::tcp::Socks5Stream;
use tracing::{debug, instrument, warn};
use webpki_roots::TLS_SERVER_ROOTS;

/// A TLS stream over TCP, used for IMAP communication.
pub(crate) type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Establishes a TLS connection to the mail server.
///
/// If a proxy is provided, the connection is routed through SOCKS5.
#[instrument(
    name = "connection::establish_tls",
    skip_all,
    fields(
        imap_host = %host,
        port = port,
        proxy_enabled = proxy.is_some(),
        verification = ?verification
    )
)]
pub(crate) async fn establish_tls_connection(
    host: &str,
    port: u16,
    proxy: Option<&Socks5Proxy>,
    verification: CertificateVerification,
) -> Result<TlsStream> {
    let target_addr = format!("{host}:{port}");
    let connector = create_tls_connector(verification);
    let server_name = parse_server_name(host)?;
    let tcp_stream = connect_tcp(&target_addr, proxy).await?;

    debug!("Performing TLS handshake");

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|source| Error::TlsConnect {
            target: target_addr,
            source,
        })
}

/// Creates a TLS connector for the requested verification mode.
fn create_tls_connector(verification: CertificateVerification) -> TlsConnector {
    let builder = ClientConfig::builder().with_safe_defaults();

    let tls_config = match verification {
        CertificateVerification::WebPki => {
            let mut root_cert_store = rustls::RootCertStore::empty();
            root_cert_store.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|ta| {
                rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                    ta.subject,
                    ta.spki,
                    ta.name_constraints,
                )
            }));
            builder
                .with_root_certificates(root_cert_store)
                .with_no_client_auth()
        }
        CertificateVerification::Relaxed => {
            warn!("Server certificate verification is disabled");
            builder
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_no_client_auth()
        }
    };

    TlsConnector::from(Arc::new(tls_config))
}

/// Parses server name for TLS SNI.
fn parse_server_name(host: &str) -> Result<ServerName> {
    ServerName::try_from(host).map_err(|source| Error::InvalidDnsName {
        host: host.to_string(),
        source,
    })
}

/// Establishes a TCP connection, optionally through SOCKS5.
async fn connect_tcp(target_addr: &str, proxy: Option<&Socks5Proxy>) -> Result<TcpStream> {
    match proxy {
        Some(proxy) => connect_via_socks5(target_addr, proxy).await,
        None => connect_direct(target_addr).await,
    }
}

async fn connect_direct(target_addr: &str) -> Result<TcpStream> {
    debug!("Establishing direct TCP connection");

    TcpStream::connect(target_addr)
        .await
        .map_err(|source| Error::TcpConnect {
            target: target_addr.to_string(),
            source,
        })
}

/// TCP connection via SOCKS5 proxy.
#[instrument(
    name = "connection::socks5",
    skip_all,
    fields(proxy = %proxy, has_auth = proxy.requires_auth())
)]
async fn connect_via_socks5(target_addr: &str, proxy: &Socks5Proxy) -> Result<TcpStream> {
    debug!("Connecting via SOCKS5 proxy");

    let proxy_addr = (proxy.host.as_str(), proxy.port);

    let stream = match &proxy.auth {
        Some(auth) => {
            Socks5Stream::connect_with_password(
                proxy_addr,
                target_addr,
                &auth.username,
                auth.password(),
            )
            .await
        }
        None => Socks5Stream::connect(proxy_addr, target_addr).await,
    };

    stream
        .map(Socks5Stream::into_inner)
        .map_err(|source| Error::Socks5Connect {
            proxy_host: proxy.host.clone(),
            target: target_addr.to_string(),
            source,
        })
}

/// Certificate verifier that accepts any server certificate.
///
/// Handshake signatures are still checked against the presented certificate;
/// only the chain of trust and the host name are skipped.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_server_name() {
        assert!(parse_server_name("post.example.pl").is_ok());
        assert!(parse_server_name("127.0.0.1").is_ok());
    }

    #[test]
    fn test_parse_invalid_server_name() {
        let result = parse_server_name("");
        assert!(matches!(result, Err(Error::InvalidDnsName { .. })));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let port = closed_port();

        let result =
            establish_tls_connection("127.0.0.1", port, None, CertificateVerification::Relaxed)
                .await;
        match result {
            Err(err @ Error::TcpConnect { .. }) => {
                assert_eq!(err.category(), crate::error::ErrorCategory::Transport);
            }
            other => panic!("expected TcpConnect, got {:?}", other.map(|_| ())),
        }
    }

    /// Returns a port nothing listens on.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_socks5_error() {
        let proxy = Socks5Proxy::new("127.0.0.1", closed_port());

        let result = establish_tls_connection(
            "post.example.pl",
            993,
            Some(&proxy),
            CertificateVerification::Relaxed,
        )
        .await;
        match result {
            Err(err @ Error::Socks5Connect { .. }) => {
                assert_eq!(err.category(), crate::error::ErrorCategory::Transport);
                assert!(err.is_retryable());
            }
            other => panic!("expected Socks5Connect, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_unreachable_proxy_with_auth_is_socks5_error() {
        let proxy = Socks5Proxy::with_auth("127.0.0.1", closed_port(), "proxyuser", "proxypass");

        let result = establish_tls_connection(
            "post.example.pl",
            993,
            Some(&proxy),
            CertificateVerification::WebPki,
        )
        .await;
        match result {
            Err(Error::Socks5Connect { proxy_host, target, .. }) => {
                assert_eq!(proxy_host, "127.0.0.1");
                assert_eq!(target, "post.example.pl:993");
            }
            other => panic!("expected Socks5Connect, got {:?}", other.map(|_| ())),
        }
    }
}
