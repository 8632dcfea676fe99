/*
 * properties.rs
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

//! Mapping between transport headers and broker message properties.

use crate::protocol::queue::broker::{PropertyValue, QueueMessage};
use crate::transport::TransportHeaders;

/// Boolean property set on fault replies.
pub const FAULT_PROPERTY: &str = "SOAPJMS_isFault";
pub const REQUEST_URI_PROPERTY: &str = "SOAPJMS_requestURI";
pub const BINDING_VERSION_PROPERTY: &str = "SOAPJMS_bindingVersion";
pub const BINDING_VERSION: &str = "1.0";

const RENAMED: &[(&str, &str)] = &[
    ("Content-Type", "SOAPJMS_contentType"),
    ("Content-Length", "SOAPJMS_contentLength"),
    ("SOAPAction", "SOAPJMS_soapAction"),
    ("Accept-Encoding", "SOAPJMS_acceptEncoding"),
];

pub fn header_to_property(name: &str) -> String {
    RENAMED
        .iter()
        .find(|(h, _)| h.eq_ignore_ascii_case(name))
        .map(|(_, p)| p.to_string())
        .unwrap_or_else(|| name.to_string())
}

pub fn property_to_header(name: &str) -> String {
    RENAMED
        .iter()
        .find(|(_, p)| *p == name)
        .map(|(h, _)| h.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Copy headers onto the message. Repeated headers are joined with ", ".
pub fn apply_headers(message: &mut QueueMessage, headers: &TransportHeaders) {
    for name in headers.names() {
        let value = headers.get_all(name).collect::<Vec<_>>().join(", ");
        message.set_property(header_to_property(name), PropertyValue::String(value));
    }
}

/// Properties as headers, minus the fault flag.
pub fn extract_headers(message: &QueueMessage) -> TransportHeaders {
    message
        .properties
        .iter()
        .filter(|(name, _)| name != FAULT_PROPERTY)
        .map(|(name, value)| (property_to_header(name), value.to_string()))
        .collect()
}

pub fn is_fault(message: &QueueMessage) -> bool {
    message
        .property(FAULT_PROPERTY)
        .and_then(PropertyValue::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::queue::broker::QueueBody;

    #[test]
    fn well_known_headers_are_renamed() {
        assert_eq!(header_to_property("soapaction"), "SOAPJMS_soapAction");
        assert_eq!(property_to_header("SOAPJMS_contentType"), "Content-Type");
        assert_eq!(header_to_property("X-Trace"), "X-Trace");
    }

    #[test]
    fn headers_survive_the_property_table() {
        let mut headers = TransportHeaders::new();
        headers.add("SOAPAction", "urn:a");
        headers.add("X-Tag", "1");
        headers.add("X-Tag", "2");
        let mut msg = QueueMessage::new(QueueBody::Text(String::new()));
        apply_headers(&mut msg, &headers);
        msg.set_property(FAULT_PROPERTY, PropertyValue::Bool(true));
        assert_eq!(
            msg.property("SOAPJMS_soapAction"),
            Some(&PropertyValue::String("urn:a".into()))
        );
        let back = extract_headers(&msg);
        assert_eq!(back.get("SOAPAction"), Some("urn:a"));
        assert_eq!(back.get("X-Tag"), Some("1, 2"));
        assert!(!back.contains(FAULT_PROPERTY));
        assert!(is_fault(&msg));
    }

    #[test]
    fn fault_accepts_string_property() {
        let mut msg = QueueMessage::new(QueueBody::Text(String::new()));
        msg.set_property(FAULT_PROPERTY, PropertyValue::String("true".into()));
        assert!(is_fault(&msg));
    }
}
