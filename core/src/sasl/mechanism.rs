/*
 * mechanism.rs
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

//! SASL mechanism names and metadata.

/// Supported SASL mechanisms (client-side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    /// PLAIN (RFC 4616) – requires TLS.
    Plain,
    /// Legacy LOGIN – requires TLS.
    Login,
    /// CRAM-MD5 (RFC 2195) – challenge-response.
    CramMd5,
    /// SCRAM-SHA-256 (RFC 5802, 7677) – challenge-response.
    ScramSha256,
}

/// Preference order when the server offers several.
const PREFERENCE: [SaslMechanism; 4] = [
    SaslMechanism::ScramSha256,
    SaslMechanism::CramMd5,
    SaslMechanism::Plain,
    SaslMechanism::Login,
];

impl SaslMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::Login => "LOGIN",
            SaslMechanism::CramMd5 => "CRAM-MD5",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
        }
    }

    pub fn requires_tls(&self) -> bool {
        matches!(self, SaslMechanism::Plain | SaslMechanism::Login)
    }

    pub fn is_challenge_response(&self) -> bool {
        matches!(self, SaslMechanism::CramMd5 | SaslMechanism::ScramSha256)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "PLAIN" => Some(SaslMechanism::Plain),
            "LOGIN" => Some(SaslMechanism::Login),
            "CRAM-MD5" => Some(SaslMechanism::CramMd5),
            "SCRAM-SHA-256" => Some(SaslMechanism::ScramSha256),
            _ => None,
        }
    }

    /// Strongest offered mechanism usable on this stream. Cleartext mechanisms
    /// are only chosen over TLS unless `allow_cleartext` is set.
    pub fn choose(offered: &[String], secure: bool, allow_cleartext: bool) -> Option<Self> {
        PREFERENCE.into_iter().find(|m| {
            offered.iter().any(|o| o.eq_ignore_ascii_case(m.name()))
                && (secure || allow_cleartext || !m.requires_tls())
        })
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
