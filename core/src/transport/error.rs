/*
 * error.rs
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

//! Transport errors shared by every binding.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed native cause carried by [`TransportError::Io`].
pub type NativeError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by connections, message senders and receivers.
///
/// "No response" is never an error: a sender-side `receive` that times out or
/// is told that nothing will come returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Destination URI is malformed or not supported by the binding. Never retried.
    #[error("invalid destination '{uri}': {reason}")]
    Address { uri: String, reason: String },

    /// A native transport operation (publish, receive, session open/close) failed.
    #[error("{operation} failed: {source}")]
    Io {
        operation: String,
        #[source]
        source: NativeError,
    },

    /// Inbound native message has a shape this binding cannot carry.
    #[error("unsupported payload: {0}")]
    UnsupportedPayload(String),

    /// The connection was used out of order (e.g. header added after the request was written).
    #[error("illegal connection state: {0}")]
    IllegalState(String),
}

impl TransportError {
    pub fn address(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        TransportError::Address {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: impl Into<NativeError>) -> Self {
        TransportError::Io {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// True for errors that came from the native transport rather than from misuse or addressing.
    pub fn is_io(&self) -> bool {
        matches!(self, TransportError::Io { .. })
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::io("I/O", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_error_keeps_native_source() {
        let err = TransportError::io(
            "publish",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        assert!(err.is_io());
        assert_eq!(err.to_string(), "publish failed: pipe closed");
        assert!(err.source().is_some());
    }

    #[test]
    fn address_error_names_uri() {
        let err = TransportError::address("jms:", "missing destination name");
        assert_eq!(err.to_string(), "invalid destination 'jms:': missing destination name");
    }
}
