//! Minimal SOCKS5 relay (RFC 1928 CONNECT, RFC 1929 username/password).
//!
//! Each accepted client is tunnelled to the requested target with
//! `copy_bidirectional`. Successful tunnels are recorded.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const VERSION: u8 = 0x05;
const NO_AUTH: u8 = 0x00;
const USER_PASS: u8 = 0x02;
const NO_ACCEPTABLE_METHOD: u8 = 0xFF;
const AUTH_VERSION: u8 = 0x01;
const CMD_CONNECT: u8 = 0x01;

/// A tunnel the relay opened on behalf of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub target: String,
    pub username: Option<String>,
}

pub struct FakeSocks5Proxy {
    port: u16,
    tunnels: Arc<Mutex<Vec<Tunnel>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeSocks5Proxy {
    /// Starts the relay. With `credentials` set, clients must authenticate
    /// with exactly that username and password.
    pub async fn start(credentials: Option<(&'static str, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();
        let tunnels = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let tunnels = tunnels.clone();
            tokio::spawn(async move {
                while let Ok((client, _addr)) = listener.accept().await {
                    let tunnels = tunnels.clone();
                    tokio::spawn(async move {
                        let _ = relay(client, credentials, &tunnels).await;
                    });
                }
            })
        };

        Self {
            port,
            tunnels,
            _handle: handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn tunnels(&self) -> Vec<Tunnel> {
        self.tunnels.lock().unwrap().clone()
    }
}

async fn relay(
    mut client: TcpStream,
    credentials: Option<(&'static str, &'static str)>,
    tunnels: &Mutex<Vec<Tunnel>>,
) -> std::io::Result<()> {
    let mut header = [0u8; 2];
    client.read_exact(&mut header).await?;
    let mut methods = vec![0u8; usize::from(header[1])];
    client.read_exact(&mut methods).await?;

    let method = if credentials.is_some() { USER_PASS } else { NO_AUTH };
    if header[0] != VERSION || !methods.contains(&method) {
        client.write_all(&[VERSION, NO_ACCEPTABLE_METHOD]).await?;
        return Ok(());
    }
    client.write_all(&[VERSION, method]).await?;

    let username = match credentials {
        Some((expected_user, expected_pass)) => {
            let (user, pass) = read_user_pass(&mut client).await?;
            let accepted = user == expected_user && pass == expected_pass;
            client
                .write_all(&[AUTH_VERSION, if accepted { 0x00 } else { 0x01 }])
                .await?;
            if !accepted {
                return Ok(());
            }
            Some(user)
        }
        None => None,
    };

    let mut request = [0u8; 4];
    client.read_exact(&mut request).await?;
    if request[0] != VERSION || request[1] != CMD_CONNECT {
        // Command not supported
        client.write_all(&reply(0x07)).await?;
        return Ok(());
    }

    let host = match request[3] {
        0x01 => {
            let mut octets = [0u8; 4];
            client.read_exact(&mut octets).await?;
            Ipv4Addr::from(octets).to_string()
        }
        0x03 => {
            let len = client.read_u8().await?;
            let mut name = vec![0u8; usize::from(len)];
            client.read_exact(&mut name).await?;
            String::from_utf8_lossy(&name).into_owned()
        }
        0x04 => {
            let mut octets = [0u8; 16];
            client.read_exact(&mut octets).await?;
            format!("[{}]", Ipv6Addr::from(octets))
        }
        _ => {
            // Address type not supported
            client.write_all(&reply(0x08)).await?;
            return Ok(());
        }
    };
    let port = client.read_u16().await?;
    let target = format!("{host}:{port}");

    let Ok(mut upstream) = TcpStream::connect(&target).await else {
        // Connection refused
        client.write_all(&reply(0x05)).await?;
        return Ok(());
    };

    tunnels.lock().unwrap().push(Tunnel { target, username });
    client.write_all(&reply(0x00)).await?;
    tokio::io::copy_bidirectional(&mut client, &mut upstream).await?;
    Ok(())
}

async fn read_user_pass(client: &mut TcpStream) -> std::io::Result<(String, String)> {
    let _version = client.read_u8().await?;
    let user_len = client.read_u8().await?;
    let mut user = vec![0u8; usize::from(user_len)];
    client.read_exact(&mut user).await?;
    let pass_len = client.read_u8().await?;
    let mut pass = vec![0u8; usize::from(pass_len)];
    client.read_exact(&mut pass).await?;
    Ok((
        String::from_utf8_lossy(&user).into_owned(),
        String::from_utf8_lossy(&pass).into_owned(),
    ))
}

/// Reply with an unspecified IPv4 bind address.
fn reply(status: u8) -> [u8; 10] {
    [VERSION, status, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
}
