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

//! POP3 protocol client: connect, STLS, USER/PASS, STAT, UIDL, RETR, DELE, RSET, QUIT.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::net::{is_disconnect, NetStream, TlsProfile};

/// POP3 client error (network, protocol, auth).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Pop3ClientError {
    pub message: String,
    pub disconnected: bool,
}

impl Pop3ClientError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            disconnected: false,
        }
    }
}

impl From<io::Error> for Pop3ClientError {
    fn from(e: io::Error) -> Self {
        Self {
            message: e.to_string(),
            disconnected: is_disconnect(&e),
        }
    }
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct Pop3Options {
    pub host: String,
    pub port: u16,
    pub implicit_tls: bool,
    pub starttls: bool,
    pub credentials: Option<(String, String)>,
    pub connect_timeout: Duration,
}

/// STAT response: message count and total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatResponse {
    pub count: u32,
    pub total_size: u64,
}

/// UIDL list entry: message number and unique-id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidlEntry {
    pub msg_no: u32,
    pub uidl: String,
}

/// One CRLF line as raw bytes, without the CRLF.
async fn read_raw_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let b = stream.read_u8().await?;
        buf.push(b);
        if buf.ends_with(b"\r\n") {
            buf.truncate(buf.len() - 2);
            return Ok(());
        }
    }
}

async fn read_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<String>
where
    S: AsyncRead + Unpin,
{
    read_raw_line(stream, buf).await?;
    Ok(String::from_utf8_lossy(buf).trim_end().to_string())
}

async fn write_line<S>(stream: &mut S, line: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

/// Read a multi-line body up to the lone "." line, undoing dot-stuffing.
async fn read_multiline<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    loop {
        read_raw_line(stream, buf).await?;
        if buf.as_slice() == b"." {
            return Ok(out);
        }
        let line = if buf.starts_with(b"..") { &buf[1..] } else { &buf[..] };
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
}

fn check_ok(line: &str) -> Result<(), Pop3ClientError> {
    if line.starts_with("+OK") {
        Ok(())
    } else {
        Err(Pop3ClientError::new(line.to_string()))
    }
}

/// `"1 abc"` → entry; lines with a bad number are skipped.
fn parse_uidl_line(line: &str) -> Option<UidlEntry> {
    let (n, uidl) = line.trim().split_once(' ')?;
    let msg_no = n.parse().ok().filter(|n| *n > 0)?;
    Some(UidlEntry {
        msg_no,
        uidl: uidl.trim().to_string(),
    })
}

/// Authenticated POP3 session (TRANSACTION state).
pub struct Pop3Session {
    stream: NetStream,
    read_buf: Vec<u8>,
}

impl Pop3Session {
    /// Connect, upgrade with STLS when asked, then USER/PASS.
    pub async fn connect(options: &Pop3Options) -> Result<Self, Pop3ClientError> {
        let stream = NetStream::connect(
            &options.host,
            options.port,
            options.implicit_tls,
            TlsProfile::Mail,
            options.connect_timeout,
        )
        .await?;
        let mut session = Self {
            stream,
            read_buf: Vec::with_capacity(4096),
        };
        let greeting = session.read_response_line().await?;
        check_ok(&greeting)?;
        if options.starttls && !session.stream.is_secure() {
            session.simple_command("STLS").await?;
            let Self { stream, read_buf } = session;
            session = Self {
                stream: stream.upgrade_to_tls(&options.host).await?,
                read_buf,
            };
        }
        if let Some((user, password)) = &options.credentials {
            session.simple_command(&format!("USER {}", user)).await?;
            session.simple_command(&format!("PASS {}", password)).await?;
        }
        debug!(host = %options.host, secure = session.stream.is_secure(), "POP3 session ready");
        Ok(session)
    }

    async fn read_response_line(&mut self) -> io::Result<String> {
        read_line(&mut self.stream, &mut self.read_buf).await
    }

    /// Single-line command; returns the `+OK` line.
    async fn simple_command(&mut self, cmd: &str) -> Result<String, Pop3ClientError> {
        write_line(&mut self.stream, cmd).await?;
        let line = self.read_response_line().await?;
        check_ok(&line)?;
        Ok(line)
    }

    pub async fn stat(&mut self) -> Result<StatResponse, Pop3ClientError> {
        let line = self.simple_command("STAT").await?;
        let mut parts = line.trim_start_matches("+OK").split_whitespace();
        let count = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let total_size = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok(StatResponse { count, total_size })
    }

    /// UIDL for every message in the maildrop.
    pub async fn uidl(&mut self) -> Result<Vec<UidlEntry>, Pop3ClientError> {
        self.simple_command("UIDL").await?;
        let body = read_multiline(&mut self.stream, &mut self.read_buf).await?;
        Ok(String::from_utf8_lossy(&body)
            .lines()
            .filter_map(parse_uidl_line)
            .collect())
    }

    /// RETR: full message bytes.
    pub async fn retr(&mut self, msg_no: u32) -> Result<Vec<u8>, Pop3ClientError> {
        self.simple_command(&format!("RETR {}", msg_no)).await?;
        Ok(read_multiline(&mut self.stream, &mut self.read_buf).await?)
    }

    /// DELE: mark for deletion at QUIT.
    pub async fn dele(&mut self, msg_no: u32) -> Result<(), Pop3ClientError> {
        self.simple_command(&format!("DELE {}", msg_no)).await.map(|_| ())
    }

    /// RSET: unmark every deletion.
    pub async fn rset(&mut self) -> Result<(), Pop3ClientError> {
        self.simple_command("RSET").await.map(|_| ())
    }

    /// QUIT: enter UPDATE state, committing deletions.
    pub async fn quit(mut self) -> Result<(), Pop3ClientError> {
        self.simple_command("QUIT").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uidl_lines() {
        assert_eq!(
            parse_uidl_line("2 QhdPYR:00WBw1Ph7x7"),
            Some(UidlEntry {
                msg_no: 2,
                uidl: "QhdPYR:00WBw1Ph7x7".to_string()
            })
        );
        assert_eq!(parse_uidl_line("0 x"), None);
        assert_eq!(parse_uidl_line("garbage"), None);
    }

    #[tokio::test]
    async fn multiline_undoes_dot_stuffing() {
        let (mut client, mut server) = tokio::io::duplex(128);
        server.write_all(b"Subject: x\r\n\r\n..hidden\r\nplain\r\n.\r\n").await.unwrap();
        let mut buf = Vec::new();
        let body = read_multiline(&mut client, &mut buf).await.unwrap();
        assert_eq!(body, b"Subject: x\r\n\r\n.hidden\r\nplain\r\n");
    }

    #[test]
    fn err_response_is_error() {
        assert!(check_ok("-ERR no such message").is_err());
        assert!(check_ok("+OK 2 320").is_ok());
    }
}
