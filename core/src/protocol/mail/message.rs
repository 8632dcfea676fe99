/*
 * message.rs
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

//! In-memory RFC 5322 message: headers, decoded single-part body, reply construction.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::message_id::new_mail_message_id;
use crate::mime::{
    decode_quoted_printable, parse_address_list, parse_message_id_list, sanitize_value,
    split_message,
};
use crate::transport::TransportHeaders;

/// Header carrying the fault flag on mail requests and replies.
pub const FAULT_HEADER: &str = "SOAPJMS_isFault";

const BASE64_LINE: usize = 76;

/// A mail message held fully in memory. The body is always the decoded
/// content; the transfer encoding is chosen again on serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailMessage {
    headers: TransportHeaders,
    body: Bytes,
}

impl MailMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw RFC 5322 bytes. Base64 and quoted-printable bodies are
    /// decoded; anything else is taken verbatim.
    pub fn parse(raw: &[u8]) -> Self {
        let (fields, body) = split_message(raw);
        let headers: TransportHeaders = fields.into_iter().collect();
        let encoding = headers
            .get("Content-Transfer-Encoding")
            .map(|e| e.trim().to_ascii_lowercase());
        let body = match encoding.as_deref() {
            Some("base64") => {
                let compact: Vec<u8> = body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
                match STANDARD.decode(&compact) {
                    Ok(decoded) => decoded,
                    Err(_) => body.to_vec(),
                }
            }
            Some("quoted-printable") => decode_quoted_printable(body),
            _ => body.to_vec(),
        };
        let mut message = Self {
            headers,
            body: Bytes::from(body),
        };
        message.headers.remove("Content-Transfer-Encoding");
        message
    }

    pub fn headers(&self) -> &TransportHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut TransportHeaders {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Replace every value of `name` with `value`.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        self.headers.set(name, sanitize_value(value.as_ref()));
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        self.headers.add(name, sanitize_value(value.as_ref()));
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header("Message-ID")
    }

    /// Ids listed in In-Reply-To. Empty when absent or malformed.
    pub fn in_reply_to(&self) -> Vec<String> {
        self.header("In-Reply-To")
            .and_then(parse_message_id_list)
            .unwrap_or_default()
    }

    /// Bare address of the first From mailbox.
    pub fn from_address(&self) -> Option<String> {
        self.header("From").and_then(|f| parse_address_list(f).into_iter().next())
    }

    /// Envelope recipients: every address in To and Cc.
    pub fn recipients(&self) -> Vec<String> {
        self.headers
            .get_all("To")
            .chain(self.headers.get_all("Cc"))
            .flat_map(parse_address_list)
            .collect()
    }

    pub fn is_fault(&self) -> bool {
        self.header(FAULT_HEADER)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Assign Message-ID, Date and MIME-Version if missing. Returns the Message-ID.
    pub fn prepare_for_send(&mut self) -> String {
        if self.header("Date").is_none() {
            self.set_header("Date", chrono::Utc::now().to_rfc2822());
        }
        if self.header("MIME-Version").is_none() {
            self.set_header("MIME-Version", "1.0");
        }
        match self.message_id() {
            Some(id) => id.to_string(),
            None => {
                let id = new_mail_message_id(self.from_address().as_deref());
                self.set_header("Message-ID", id.as_str());
                id.as_str().to_string()
            }
        }
    }

    /// Build the reply: To is Reply-To (or From), subject gains `Re:`,
    /// In-Reply-To is this message's id and References carries the thread.
    pub fn reply(&self, from: Option<&str>) -> MailMessage {
        let mut reply = MailMessage::new();
        if let Some(from) = from {
            reply.set_header("From", from);
        }
        let to = self.header("Reply-To").or_else(|| self.header("From"));
        if let Some(to) = to {
            reply.set_header("To", to);
        }
        let subject = self.subject().unwrap_or("");
        if subject.len() >= 3 && subject[..3].eq_ignore_ascii_case("re:") {
            reply.set_header("Subject", subject);
        } else {
            reply.set_header("Subject", format!("Re: {}", subject).trim_end());
        }
        if let Some(id) = self.message_id() {
            reply.set_header("In-Reply-To", id);
            let mut references: Vec<String> = self
                .header("References")
                .and_then(parse_message_id_list)
                .unwrap_or_else(|| self.in_reply_to());
            references.push(id.to_string());
            reply.set_header("References", references.join(" "));
        }
        reply
    }

    /// Serialize with CRLF line endings and a base64 body.
    pub fn to_rfc822(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() * 4 / 3 + 512);
        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("Content-Transfer-Encoding") {
                continue;
            }
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n\r\n");
        let encoded = STANDARD.encode(&self.body);
        for line in encoded.as_bytes().chunks(BASE64_LINE) {
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decodes_base64_body() {
        let raw = b"From: a@x.org\r\nContent-Transfer-Encoding: base64\r\n\r\naGVs\r\nbG8=\r\n";
        let m = MailMessage::parse(raw);
        assert_eq!(m.body().as_ref(), b"hello");
        assert!(m.header("Content-Transfer-Encoding").is_none());
    }

    #[test]
    fn parse_decodes_quoted_printable_body() {
        let raw = b"Content-Transfer-Encoding: quoted-printable\r\n\r\n<a>=3D</a>=\r\n";
        assert_eq!(MailMessage::parse(raw).body().as_ref(), b"<a>=</a>");
    }

    #[test]
    fn serialize_then_parse_keeps_body_and_headers() {
        let mut m = MailMessage::new();
        m.set_header("To", "svc@example.com");
        m.set_header("Content-Type", "text/xml; charset=utf-8");
        m.set_body(vec![b'x'; 200]);
        let raw = m.to_rfc822();
        assert!(raw.windows(2).all(|w| w != b"\n\n"));
        let back = MailMessage::parse(&raw);
        assert_eq!(back.body(), m.body());
        assert_eq!(back.header("content-type"), Some("text/xml; charset=utf-8"));
    }

    #[test]
    fn reply_threads_and_addresses() {
        let mut req = MailMessage::new();
        req.set_header("From", "Client <client@example.com>");
        req.set_header("Reply-To", "replies@example.com");
        req.set_header("Subject", "order");
        req.set_header("Message-ID", "<1.abc@example.com>");
        req.set_header("References", "<0.root@example.com>");

        let reply = req.reply(Some("svc@example.com"));
        assert_eq!(reply.header("To"), Some("replies@example.com"));
        assert_eq!(reply.header("From"), Some("svc@example.com"));
        assert_eq!(reply.subject(), Some("Re: order"));
        assert_eq!(reply.in_reply_to(), vec!["<1.abc@example.com>"]);
        assert_eq!(
            reply.header("References"),
            Some("<0.root@example.com> <1.abc@example.com>")
        );
    }

    #[test]
    fn reply_does_not_stack_re_prefix() {
        let mut req = MailMessage::new();
        req.set_header("From", "c@example.com");
        req.set_header("Subject", "RE: order");
        assert_eq!(req.reply(None).subject(), Some("RE: order"));
    }

    #[test]
    fn prepare_assigns_message_id_once() {
        let mut m = MailMessage::new();
        m.set_header("From", "svc@example.com");
        let id = m.prepare_for_send();
        assert!(id.ends_with("@example.com>"));
        assert_eq!(m.prepare_for_send(), id);
        assert!(m.header("Date").is_some());
    }

    #[test]
    fn recipients_from_to_and_cc() {
        let mut m = MailMessage::new();
        m.add_header("To", "A <a@x.org>, b@x.org");
        m.add_header("Cc", "c@x.org");
        assert_eq!(m.recipients(), vec!["a@x.org", "b@x.org", "c@x.org"]);
    }

    #[test]
    fn fault_header() {
        let mut m = MailMessage::new();
        assert!(!m.is_fault());
        m.set_header(FAULT_HEADER, "true");
        assert!(m.is_fault());
    }
}
