/*
 * config.rs
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

//! Transport configuration: timeouts, grace period, poll interval and mail service URLs.
//!
//! Read from an XML file with quick_xml. Every element and attribute is optional:
//!
//! ```xml
//! <corriere>
//!   <http connect-timeout-ms="15000" read-timeout-ms="60000"/>
//!   <queue receive-timeout-ms="-1" message-type="text"/>
//!   <mail from="svc@example.com" store-uri="imaps://svc:pw@mail.example.com/INBOX"
//!         transport-uri="smtp://mail.example.com:587?starttls=true"
//!         grace-period-ms="60000" poll-interval-ms="60000"
//!         delete-after-receive="false" delete-messages="true"/>
//! </corriere>
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;
use tracing::warn;

use crate::uri::MessageType;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid value '{value}' for {element}/@{attribute}")]
    Value {
        element: String,
        attribute: String,
        value: String,
    },
}

/// HTTP sender settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    /// `None` waits forever for the response.
    pub read_timeout: Option<Duration>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}

/// Queue-messaging sender settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// `None` waits forever for the reply.
    pub receive_timeout: Option<Duration>,
    /// Used when the destination URI does not name a message type.
    pub message_type: MessageType,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            receive_timeout: Some(DEFAULT_RECEIVE_TIMEOUT),
            message_type: MessageType::Bytes,
        }
    }
}

/// Mail sender and receiver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub from: Option<String>,
    /// Mailbox polled for replies (sender) or requests (receiver).
    pub store_uri: Option<String>,
    /// SMTP server used for requests and replies.
    pub transport_uri: Option<String>,
    /// Sender-side wait between sending a request and the first poll.
    pub grace_period: Duration,
    /// Receiver-side wait between polls.
    pub poll_interval: Duration,
    /// Sender deletes a reply from the mailbox once read.
    pub delete_after_receive: bool,
    /// Receiver deletes requests once dispatched.
    pub delete_messages: bool,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: None,
            store_uri: None,
            transport_uri: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            delete_after_receive: false,
            delete_messages: true,
        }
    }
}

impl MailSettings {
    /// Request/reply over mail only works when the sender waits at least as long
    /// as the responder takes to notice a request.
    pub fn grace_covers_poll_interval(&self) -> bool {
        self.grace_period >= self.poll_interval
    }
}

/// Everything the bindings read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub http: HttpSettings,
    pub queue: QueueSettings,
    pub mail: MailSettings,
}

/// Load configuration from an XML file.
pub fn load_config(path: &Path) -> Result<TransportConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

/// Parse configuration XML.
pub fn parse_config(content: &str) -> Result<TransportConfig, ConfigError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut config = TransportConfig::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"http" => apply_http(&e, &mut config.http)?,
                b"queue" => apply_queue(&e, &mut config.queue)?,
                b"mail" => apply_mail(&e, &mut config.mail)?,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }
    if !config.mail.grace_covers_poll_interval() {
        warn!(
            grace_ms = config.mail.grace_period.as_millis() as u64,
            poll_ms = config.mail.poll_interval.as_millis() as u64,
            "mail grace period is shorter than the poll interval; replies may be missed"
        );
    }
    Ok(config)
}

/// Attributes of one element as (name, unescaped value).
fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, ConfigError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn bad(element: &str, attribute: &str, value: &str) -> ConfigError {
    ConfigError::Value {
        element: element.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

fn millis(element: &str, attribute: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| bad(element, attribute, value))
}

/// Milliseconds where any negative value means "forever".
fn millis_or_forever(element: &str, attribute: &str, value: &str) -> Result<Option<Duration>, ConfigError> {
    let n = value
        .trim()
        .parse::<i64>()
        .map_err(|_| bad(element, attribute, value))?;
    Ok(if n < 0 {
        None
    } else {
        Some(Duration::from_millis(n as u64))
    })
}

fn boolean(element: &str, attribute: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(bad(element, attribute, value)),
    }
}

fn apply_http(e: &BytesStart<'_>, http: &mut HttpSettings) -> Result<(), ConfigError> {
    for (k, v) in attributes(e)? {
        match k.as_str() {
            "connect-timeout-ms" => http.connect_timeout = millis("http", &k, &v)?,
            "read-timeout-ms" => http.read_timeout = millis_or_forever("http", &k, &v)?,
            _ => {}
        }
    }
    Ok(())
}

fn apply_queue(e: &BytesStart<'_>, queue: &mut QueueSettings) -> Result<(), ConfigError> {
    for (k, v) in attributes(e)? {
        match k.as_str() {
            "receive-timeout-ms" => queue.receive_timeout = millis_or_forever("queue", &k, &v)?,
            "message-type" => {
                queue.message_type = match v.to_ascii_lowercase().as_str() {
                    "bytes" => MessageType::Bytes,
                    "text" => MessageType::Text,
                    _ => return Err(bad("queue", &k, &v)),
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn apply_mail(e: &BytesStart<'_>, mail: &mut MailSettings) -> Result<(), ConfigError> {
    for (k, v) in attributes(e)? {
        match k.as_str() {
            "from" => mail.from = Some(v),
            "store-uri" => mail.store_uri = Some(v),
            "transport-uri" => mail.transport_uri = Some(v),
            "grace-period-ms" => mail.grace_period = millis("mail", &k, &v)?,
            "poll-interval-ms" => mail.poll_interval = millis("mail", &k, &v)?,
            "delete-after-receive" => mail.delete_after_receive = boolean("mail", &k, &v)?,
            "delete-messages" => mail.delete_messages = boolean("mail", &k, &v)?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let c = parse_config("<corriere/>").unwrap();
        assert_eq!(c, TransportConfig::default());
        assert_eq!(c.queue.receive_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn reads_every_section() {
        let c = parse_config(
            r#"<?xml version="1.0"?>
            <corriere>
              <http connect-timeout-ms="2000" read-timeout-ms="-1"/>
              <queue receive-timeout-ms="-1" message-type="text"/>
              <mail from="svc@example.com" store-uri="imap://svc:pw@localhost/INBOX"
                    grace-period-ms="500" poll-interval-ms="250" delete-after-receive="true"/>
            </corriere>"#,
        )
        .unwrap();
        assert_eq!(c.http.connect_timeout, Duration::from_secs(2));
        assert_eq!(c.http.read_timeout, None);
        assert_eq!(c.queue.receive_timeout, None);
        assert_eq!(c.queue.message_type, MessageType::Text);
        assert_eq!(c.mail.from.as_deref(), Some("svc@example.com"));
        assert_eq!(c.mail.grace_period, Duration::from_millis(500));
        assert!(c.mail.delete_after_receive);
        assert!(c.mail.delete_messages);
        assert!(c.mail.grace_covers_poll_interval());
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = parse_config(r#"<corriere><mail grace-period-ms="soon"/></corriere>"#).unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
    }

    #[test]
    fn grace_shorter_than_poll_is_flagged_not_rejected() {
        let c = parse_config(r#"<corriere><mail grace-period-ms="100" poll-interval-ms="1000"/></corriere>"#).unwrap();
        assert!(!c.mail.grace_covers_poll_interval());
    }
}
