/*
 * client.rs
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

//! Async SMTP client: connect, EHLO, STARTTLS, AUTH, MAIL FROM, RCPT TO, DATA/BDAT, QUIT.

use std::io;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::net::{NetStream, TlsProfile};
use crate::protocol::smtp::dot_stuffer::DotStuffer;
use crate::sasl::{initial_client_response, respond_to_challenge, SaslError, SaslFirst, SaslMechanism};

/// SMTP client error (network, protocol, auth).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SmtpClientError {
    pub message: String,
    /// Underlying I/O error kind when the failure was a socket error.
    pub io_kind: Option<io::ErrorKind>,
}

impl SmtpClientError {
    fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            io_kind: None,
        }
    }
}

impl From<io::Error> for SmtpClientError {
    fn from(e: io::Error) -> Self {
        Self {
            message: e.to_string(),
            io_kind: Some(e.kind()),
        }
    }
}

impl From<SaslError> for SmtpClientError {
    fn from(e: SaslError) -> Self {
        Self::new(e.to_string())
    }
}

/// Where and how to reach the submission server.
#[derive(Debug, Clone)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub implicit_tls: bool,
    /// Upgrade a plain connection when the server advertises STARTTLS.
    pub starttls: bool,
    /// (authcid, password); mechanism is chosen from what the server offers.
    pub credentials: Option<(String, String)>,
    pub ehlo_hostname: String,
    pub connect_timeout: Duration,
}

impl SmtpOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            implicit_tls: port == 465,
            starttls: true,
            credentials: None,
            ehlo_hostname: "localhost".to_string(),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

/// Envelope for MAIL FROM / RCPT TO (bare addresses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEnvelope {
    pub from: String,
    pub recipients: Vec<String>,
}

/// Parsed SMTP response (code + lines).
struct SmtpResponse {
    code: u16,
    lines: Vec<String>,
}

impl SmtpResponse {
    fn message(&self) -> &str {
        self.lines.last().map(|s| s.as_str()).unwrap_or("")
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Read one CRLF-terminated line into `buf` (without the CRLF).
async fn read_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let b = match stream.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
            }
            Err(e) => return Err(e),
        };
        buf.push(b);
        if buf.ends_with(b"\r\n") {
            buf.truncate(buf.len() - 2);
            return Ok(());
        }
    }
}

/// Read one SMTP response (single line or multi-line).
async fn read_response<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<SmtpResponse>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        read_line(stream, buf).await?;
        let line = String::from_utf8_lossy(buf).trim().to_string();
        if line.len() < 3 {
            continue;
        }
        let code: u16 = line[..3].parse().unwrap_or(0);
        let continuation = line.as_bytes().get(3) == Some(&b'-');
        let text = if line.len() > 4 { line[4..].trim() } else { "" };
        lines.push(text.to_string());
        if !continuation {
            return Ok(SmtpResponse { code, lines });
        }
    }
}

/// Write a line (no CRLF) then CRLF.
async fn write_line<S>(stream: &mut S, line: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

/// Capabilities from EHLO.
#[derive(Debug, Default)]
struct Capabilities {
    starttls: bool,
    auth_methods: Vec<String>,
    chunking: bool,
}

async fn ehlo<S>(stream: &mut S, read_buf: &mut Vec<u8>, hostname: &str) -> Result<Capabilities, SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_line(stream, format!("EHLO {}", hostname).as_bytes()).await?;
    let r = read_response(stream, read_buf).await?;
    if r.code == 502 {
        write_line(stream, format!("HELO {}", hostname).as_bytes()).await?;
        let r = read_response(stream, read_buf).await?;
        if !r.is_success() {
            return Err(SmtpClientError::new(format!("HELO failed: {} {}", r.code, r.message())));
        }
        return Ok(Capabilities::default());
    }
    if !r.is_success() {
        return Err(SmtpClientError::new(format!("EHLO failed: {} {}", r.code, r.message())));
    }
    let mut caps = Capabilities::default();
    for line in r.lines.iter().skip(1) {
        let upper = line.to_uppercase();
        if upper == "STARTTLS" {
            caps.starttls = true;
        } else if let Some(methods) = upper.strip_prefix("AUTH ").or_else(|| upper.strip_prefix("AUTH=")) {
            caps.auth_methods.extend(methods.split_whitespace().map(str::to_string));
        } else if upper == "CHUNKING" {
            caps.chunking = true;
        }
    }
    Ok(caps)
}

/// Perform AUTH with the strongest mechanism the server offers.
async fn do_auth<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    authcid: &str,
    password: &str,
    auth_methods: &[String],
    secure: bool,
) -> Result<(), SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mechanism = SaslMechanism::choose(auth_methods, secure, false)
        .ok_or_else(|| SmtpClientError::new("no usable AUTH mechanism offered"))?;
    let (initial, mut scram_state) = match initial_client_response(mechanism, "", authcid, password)? {
        SaslFirst::Done(b) => (b, None),
        SaslFirst::ScramContinue(b, state) => (b, Some(state)),
    };
    let mut cmd = format!("AUTH {}", mechanism.name());
    if !initial.is_empty() {
        cmd.push(' ');
        cmd.push_str(&STANDARD.encode(&initial));
    }
    write_line(stream, cmd.as_bytes()).await?;

    loop {
        let r = read_response(stream, read_buf).await?;
        match r.code {
            235 => return Ok(()),
            334 => {
                if mechanism == SaslMechanism::ScramSha256 && scram_state.is_none() {
                    // server-final carries the verifier; nothing more to send
                    write_line(stream, b"").await?;
                    continue;
                }
                let response =
                    respond_to_challenge(mechanism, r.message().trim(), authcid, password, scram_state.as_ref())?;
                scram_state = None;
                write_line(stream, STANDARD.encode(&response).as_bytes()).await?;
            }
            code => {
                return Err(SmtpClientError::new(format!("auth failed: {} {}", code, r.message())));
            }
        }
    }
}

/// MAIL FROM, RCPT TO, then DATA (dot-stuffed) or BDAT when CHUNKING is advertised.
async fn send_transaction<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    envelope: &SmtpEnvelope,
    message: &[u8],
    use_bdat: bool,
) -> Result<(), SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if envelope.recipients.is_empty() {
        return Err(SmtpClientError::new("no recipients"));
    }
    write_line(stream, format!("MAIL FROM:<{}>", envelope.from).as_bytes()).await?;
    let r = read_response(stream, read_buf).await?;
    if !r.is_success() {
        return Err(SmtpClientError::new(format!("MAIL FROM failed: {} {}", r.code, r.message())));
    }
    for rcpt in &envelope.recipients {
        write_line(stream, format!("RCPT TO:<{}>", rcpt).as_bytes()).await?;
        let r = read_response(stream, read_buf).await?;
        if !r.is_success() {
            return Err(SmtpClientError::new(format!("RCPT TO failed: {} {}", r.code, r.message())));
        }
    }

    if use_bdat {
        write_line(stream, format!("BDAT {} LAST", message.len()).as_bytes()).await?;
        stream.write_all(message).await?;
        stream.flush().await?;
    } else {
        write_line(stream, b"DATA").await?;
        let r = read_response(stream, read_buf).await?;
        if r.code != 354 {
            return Err(SmtpClientError::new(format!("DATA not accepted: {} {}", r.code, r.message())));
        }
        let mut data_buf = Vec::with_capacity(message.len() + 128);
        let mut stuffer = DotStuffer::new();
        stuffer.process_chunk(message, |s| data_buf.extend_from_slice(s));
        stuffer.end_message(|s| data_buf.extend_from_slice(s));
        stream.write_all(&data_buf).await?;
        stream.flush().await?;
    }

    let r = read_response(stream, read_buf).await?;
    if !r.is_success() {
        return Err(SmtpClientError::new(format!("message rejected: {} {}", r.code, r.message())));
    }
    Ok(())
}

/// Established SMTP session (after greeting, EHLO, optional STARTTLS and AUTH).
pub struct SmtpSession {
    stream: NetStream,
    read_buf: Vec<u8>,
    chunking: bool,
}

impl SmtpSession {
    /// Connect and run setup. No message is sent yet.
    pub async fn connect(options: &SmtpOptions) -> Result<Self, SmtpClientError> {
        let mut stream = NetStream::connect(
            &options.host,
            options.port,
            options.implicit_tls,
            TlsProfile::Mail,
            options.connect_timeout,
        )
        .await?;
        let mut read_buf = Vec::with_capacity(512);
        let r = read_response(&mut stream, &mut read_buf).await?;
        if r.code != 220 {
            return Err(SmtpClientError::new(format!(
                "expected 220 greeting, got {} {}",
                r.code,
                r.message()
            )));
        }
        let mut caps = ehlo(&mut stream, &mut read_buf, &options.ehlo_hostname).await?;
        if !stream.is_secure() && options.starttls && caps.starttls {
            write_line(&mut stream, b"STARTTLS").await?;
            let r = read_response(&mut stream, &mut read_buf).await?;
            if r.code != 220 {
                return Err(SmtpClientError::new(format!("STARTTLS failed: {} {}", r.code, r.message())));
            }
            stream = stream.upgrade_to_tls(&options.host).await?;
            caps = ehlo(&mut stream, &mut read_buf, &options.ehlo_hostname).await?;
        }
        if let Some((authcid, password)) = &options.credentials {
            let secure = stream.is_secure();
            do_auth(&mut stream, &mut read_buf, authcid, password, &caps.auth_methods, secure).await?;
        }
        debug!(host = %options.host, port = options.port, secure = stream.is_secure(), "SMTP session ready");
        Ok(Self {
            stream,
            read_buf,
            chunking: caps.chunking,
        })
    }

    /// Send one message; the session stays open.
    pub async fn send(&mut self, envelope: &SmtpEnvelope, message: &[u8]) -> Result<(), SmtpClientError> {
        send_transaction(&mut self.stream, &mut self.read_buf, envelope, message, self.chunking).await
    }

    /// QUIT and drop the connection.
    pub async fn quit(mut self) -> Result<(), SmtpClientError> {
        write_line(&mut self.stream, b"QUIT").await?;
        let _ = read_response(&mut self.stream, &mut self.read_buf).await?;
        Ok(())
    }
}

/// One-shot session: connect, send, QUIT.
pub async fn send_message_async(
    options: &SmtpOptions,
    envelope: &SmtpEnvelope,
    message: &[u8],
) -> Result<(), SmtpClientError> {
    let mut session = SmtpSession::connect(options).await?;
    session.send(envelope, message).await?;
    session.quit().await
}
