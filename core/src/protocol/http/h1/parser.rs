/*
 * parser.rs
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

//! HTTP/1.1 push parser: start line, headers, body (Content-Length, chunked
//! or until close). Parses both requests and responses.

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// First line of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartLine<'a> {
    Request { method: &'a str, target: &'a str },
    Status { code: u16, reason: Option<&'a str> },
}

/// Callback for HTTP/1.1 message events.
pub trait H1Handler {
    fn start_line(&mut self, line: StartLine<'_>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, name: &str, value: &str) {
        let _ = (name, value);
    }
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StartLine,
    Headers,
    /// Headers done; the caller must call `set_body_mode()`.
    HeadersComplete,
    Body,
    /// No length: body runs until the peer closes.
    UntilClose,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
    Complete,
}

/// Push parser. Feed bytes via `receive`; the handler sees tokens as they complete.
pub struct H1Parser {
    kind: MessageKind,
    state: ParseState,
    content_length: u64,
    bytes_received: u64,
    chunk_remaining: u64,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Bytes up to the next CRLF, or None if the line is incomplete.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    Some((line[..colon].trim(), line[colon + 1..].trim()))
}

/// Content-Length and chunked flag from parsed headers.
pub fn body_framing<'a>(headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> (Option<u64>, bool) {
    let mut length = None;
    let mut chunked = false;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-length") {
            length = value.trim().parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
        }
    }
    (length, chunked)
}

impl H1Parser {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            state: ParseState::StartLine,
            content_length: 0,
            bytes_received: 0,
            chunk_remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.kind);
    }

    fn line<'b>(buf: &'b [u8], end: usize, what: &str) -> io::Result<&'b str> {
        std::str::from_utf8(&buf[..end]).map_err(|_| invalid(what))
    }

    fn start_line<H: H1Handler>(&self, line: &str, handler: &mut H) -> io::Result<()> {
        let mut parts = line.splitn(3, ' ');
        let first = parts.next().unwrap_or("");
        let second = parts.next().unwrap_or("");
        let third = parts.next();
        match self.kind {
            MessageKind::Response => {
                if !first.starts_with("HTTP/") {
                    return Err(invalid("malformed status line"));
                }
                let code = second
                    .parse::<u16>()
                    .ok()
                    .filter(|c| (100..600).contains(c))
                    .ok_or_else(|| invalid("malformed status code"))?;
                handler.start_line(StartLine::Status {
                    code,
                    reason: third.filter(|r| !r.is_empty()),
                });
            }
            MessageKind::Request => {
                if first.is_empty() || second.is_empty() || !third.is_some_and(|v| v.starts_with("HTTP/")) {
                    return Err(invalid("malformed request line"));
                }
                handler.start_line(StartLine::Request {
                    method: first,
                    target: second,
                });
            }
        }
        Ok(())
    }

    /// Consume and parse as much as possible from buf. Partial data stays in buf.
    pub fn receive<H: H1Handler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StartLine => {
                    let Some(end) = find_crlf(buf) else {
                        return Ok(());
                    };
                    let line = buf.split_to(end + 2);
                    // tolerate blank lines between messages
                    if end == 0 {
                        continue;
                    }
                    let text = Self::line(&line, end, "invalid start line UTF-8")?;
                    self.start_line(text, handler)?;
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(end) = find_crlf(buf) else {
                        return Ok(());
                    };
                    if end == 0 {
                        buf.advance(2);
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let line = buf.split_to(end + 2);
                    let text = Self::line(&line, end, "invalid header UTF-8")?;
                    if let Some((name, value)) = split_header(text) {
                        handler.header(name, value);
                    }
                }
                ParseState::HeadersComplete | ParseState::Complete => return Ok(()),
                ParseState::Body => {
                    let remaining = self.content_length - self.bytes_received;
                    let take = remaining.min(buf.len() as u64) as usize;
                    let chunk = buf.split_to(take);
                    handler.body_chunk(&chunk);
                    self.bytes_received += take as u64;
                    if self.bytes_received >= self.content_length {
                        self.finish(handler);
                    }
                }
                ParseState::UntilClose => {
                    let chunk = buf.split_to(buf.len());
                    handler.body_chunk(&chunk);
                }
                ParseState::ChunkSize => {
                    let Some(end) = find_crlf(buf) else {
                        return Ok(());
                    };
                    let line = buf.split_to(end + 2);
                    let text = Self::line(&line, end, "invalid chunk size")?;
                    let hex = text.split(';').next().unwrap_or(text).trim();
                    self.chunk_remaining = u64::from_str_radix(hex, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    let take = self.chunk_remaining.min(buf.len() as u64) as usize;
                    let chunk = buf.split_to(take);
                    handler.body_chunk(&chunk);
                    self.chunk_remaining -= take as u64;
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(end) = find_crlf(buf) else {
                        return Ok(());
                    };
                    let line = buf.split_to(end + 2);
                    if end == 0 {
                        self.finish(handler);
                        continue;
                    }
                    let text = Self::line(&line, end, "invalid trailer")?;
                    if let Some((name, value)) = split_header(text) {
                        handler.trailer(name, value);
                    }
                }
            }
        }
        Ok(())
    }

    fn finish<H: H1Handler>(&mut self, handler: &mut H) {
        handler.complete();
        self.state = ParseState::Complete;
    }

    /// Called in `HeadersComplete`. `None` with `chunked == false` reads until close.
    pub fn set_body_mode<H: H1Handler>(&mut self, content_length: Option<u64>, chunked: bool, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.bytes_received = 0;
        self.state = match (chunked, content_length) {
            (true, _) => ParseState::ChunkSize,
            (false, Some(0)) => {
                self.finish(handler);
                return;
            }
            (false, Some(n)) => {
                self.content_length = n;
                ParseState::Body
            }
            (false, None) => ParseState::UntilClose,
        };
    }

    /// The peer closed. Content-Length is advisory: a short body still completes.
    /// Returns false when the message was cut off before its headers ended.
    pub fn finish_on_eof<H: H1Handler>(&mut self, handler: &mut H) -> bool {
        match self.state {
            ParseState::Complete => true,
            ParseState::Body | ParseState::UntilClose => {
                self.finish(handler);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        status: Option<u16>,
        request: Option<(String, String)>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        complete: bool,
    }

    impl H1Handler for Recorder {
        fn start_line(&mut self, line: StartLine<'_>) {
            match line {
                StartLine::Status { code, .. } => self.status = Some(code),
                StartLine::Request { method, target } => self.request = Some((method.into(), target.into())),
            }
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.into(), value.into()));
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn complete(&mut self) {
            self.complete = true;
        }
    }

    fn headers_done(parser: &mut H1Parser, rec: &mut Recorder) {
        assert_eq!(parser.state(), ParseState::HeadersComplete);
        let (length, chunked) = body_framing(rec.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let mut tmp = Recorder::default();
        parser.set_body_mode(length, chunked, &mut tmp);
        rec.complete |= tmp.complete;
    }

    #[test]
    fn content_length_body_split_across_reads() {
        let mut parser = H1Parser::new(MessageKind::Response);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhe"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        headers_done(&mut parser, &mut rec);
        parser.receive(&mut buf, &mut rec).unwrap();
        buf.extend_from_slice(b"llo");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.status, Some(200));
        assert_eq!(rec.body, b"hello");
        assert!(rec.complete);
    }

    #[test]
    fn chunked_body_with_trailer() {
        let mut parser = H1Parser::new(MessageKind::Response);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2;x=y\r\nde\r\n0\r\nX-T: 1\r\n\r\n"[..],
        );
        parser.receive(&mut buf, &mut rec).unwrap();
        headers_done(&mut parser, &mut rec);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.body, b"abcde");
        assert!(rec.complete);
        assert_eq!(parser.state(), ParseState::Complete);
    }

    #[test]
    fn short_body_completes_on_eof() {
        let mut parser = H1Parser::new(MessageKind::Response);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nonly this"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        headers_done(&mut parser, &mut rec);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert!(!rec.complete);
        assert!(parser.finish_on_eof(&mut rec));
        assert!(rec.complete);
        assert_eq!(rec.body, b"only this");
    }

    #[test]
    fn request_line_is_parsed() {
        let mut parser = H1Parser::new(MessageKind::Request);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"POST /service HTTP/1.1\r\nHost: x\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.request, Some(("POST".into(), "/service".into())));
        assert_eq!(parser.state(), ParseState::HeadersComplete);
    }

    #[test]
    fn garbage_status_line_is_rejected() {
        let mut parser = H1Parser::new(MessageKind::Response);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"SMTP ready\r\n"[..]);
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }

    #[test]
    fn eof_inside_headers_is_truncation() {
        let mut parser = H1Parser::new(MessageKind::Response);
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert!(!parser.finish_on_eof(&mut rec));
    }
}
