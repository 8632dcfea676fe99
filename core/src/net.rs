/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, a multi-transport message exchange library.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TCP and TLS streams shared by the HTTP, SMTP, IMAP and POP3 clients.
//!
//! A [`NetStream`] is plain or secure. Implicit TLS handshakes immediately on
//! connect; STARTTLS upgrades a plain stream after protocol negotiation.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(e) => debug!(error = %e, "native root certificates unavailable"),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

fn client_config(alpn: &[&[u8]]) -> Arc<ClientConfig> {
    let mut config = ClientConfig::builder()
        .with_root_certificates(build_root_store())
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
    Arc::new(config)
}

static MAIL_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();
static HTTP_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

/// Connector for mail protocols (no ALPN).
fn mail_connector() -> &'static TlsConnector {
    MAIL_CONNECTOR.get_or_init(|| TlsConnector::from(client_config(&[])))
}

/// Connector for HTTP/1.1 (ALPN `http/1.1`).
fn http_connector() -> &'static TlsConnector {
    HTTP_CONNECTOR.get_or_init(|| TlsConnector::from(client_config(&[b"http/1.1"])))
}

/// Which TLS profile a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProfile {
    Mail,
    Http,
}

impl TlsProfile {
    fn connector(self) -> &'static TlsConnector {
        match self {
            TlsProfile::Mail => mail_connector(),
            TlsProfile::Http => http_connector(),
        }
    }
}

fn server_name(host: &str) -> io::Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))
}

async fn tcp_connect(host: &str, port: u16, connect_timeout: Duration) -> io::Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    timeout(connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))?
}

/// Plain TCP or TLS over TCP. Implements AsyncRead + AsyncWrite.
pub enum NetStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl NetStream {
    /// Connect; `implicit_tls` handshakes right away (IMAPS 993, POP3S 995, SMTPS 465, HTTPS).
    pub async fn connect(
        host: &str,
        port: u16,
        implicit_tls: bool,
        profile: TlsProfile,
        connect_timeout: Duration,
    ) -> io::Result<Self> {
        let tcp = tcp_connect(host, port, connect_timeout).await?;
        if implicit_tls {
            let tls = profile
                .connector()
                .connect(server_name(host)?, tcp)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
            Ok(NetStream::Tls(Box::new(tls)))
        } else {
            Ok(NetStream::Plain(tcp))
        }
    }

    /// Upgrade a plain stream to TLS after the server accepted STARTTLS/STLS.
    pub async fn upgrade_to_tls(self, host: &str) -> io::Result<Self> {
        match self {
            NetStream::Plain(tcp) => {
                let tls = mail_connector()
                    .connect(server_name(host)?, tcp)
                    .await
                    .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
                Ok(NetStream::Tls(Box::new(tls)))
            }
            tls @ NetStream::Tls(_) => Ok(tls),
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, NetStream::Tls(_))
    }
}

impl AsyncRead for NetStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            NetStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            NetStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_flush(cx),
            NetStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            NetStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// True for I/O errors that mean the peer went away.
pub fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}
