/*
 * message_id.rs
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

//! Correlation tokens: RFC 5322 Message-IDs used to match mail replies to requests.

use std::fmt;

use rand::Rng;

/// Transport-native identifier used to match a reply to its request.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare ignoring surrounding angle brackets and whitespace, so `<a@b>` matches `a@b`.
    pub fn matches(&self, other: &str) -> bool {
        strip_brackets(&self.0) == strip_brackets(other)
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn strip_brackets(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('<')
        .and_then(|r| r.strip_suffix('>'))
        .unwrap_or(s)
}

/// New `<timestamp.random@domain>` Message-ID. Domain is the part after `@`
/// of `from` when there is one, otherwise `localhost`.
pub fn new_mail_message_id(from: Option<&str>) -> CorrelationToken {
    let domain = from
        .and_then(|f| f.rsplit_once('@'))
        .map(|(_, d)| d.trim_end_matches('>'))
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    let now = chrono::Utc::now().timestamp_millis();
    let nonce: u64 = rand::thread_rng().gen();
    CorrelationToken(format!("<{}.{:016x}@{}>", now, nonce, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mail_message_id_uses_sender_domain() {
        let id = new_mail_message_id(Some("svc@example.org"));
        let s = id.as_str();
        assert!(s.starts_with('<') && s.ends_with("@example.org>"));
        assert_ne!(id, new_mail_message_id(Some("svc@example.org")));
        assert!(new_mail_message_id(None).as_str().ends_with("@localhost>"));
    }

    #[test]
    fn matching_ignores_brackets() {
        let id = CorrelationToken::new("<1.2@host>");
        assert!(id.matches("1.2@host"));
        assert!(id.matches(" <1.2@host> "));
        assert!(!id.matches("<1.3@host>"));
    }
}
