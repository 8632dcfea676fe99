/*
 * header.rs
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

//! RFC 5322 header block parsing with unfolding.

/// Split a raw message into unfolded `(name, value)` headers and the body.
///
/// The header block ends at the first empty line (CRLF or bare LF). Lines
/// starting with whitespace continue the previous header. Lines without a
/// colon are ignored. A message with no empty line is all headers.
pub fn split_message(raw: &[u8]) -> (Vec<(String, String)>, &[u8]) {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut pos = 0;
    while pos < raw.len() {
        let line_end = raw[pos..].iter().position(|&b| b == b'\n').map(|i| pos + i);
        let (line, next) = match line_end {
            Some(end) => (&raw[pos..end], end + 1),
            None => (&raw[pos..], raw.len()),
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        pos = next;
        if line.is_empty() {
            return (headers, &raw[pos..]);
        }
        let text = String::from_utf8_lossy(line);
        if line[0] == b' ' || line[0] == b'\t' {
            if let Some((_, value)) = headers.last_mut() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(text.trim());
            }
            continue;
        }
        if let Some((name, value)) = text.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    (headers, &raw[raw.len()..])
}

/// Replace CR/LF in a header value so it cannot start another header.
pub fn sanitize_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfolds_continuations() {
        let raw = b"Subject: a long\r\n  subject\r\nTo: x@y\r\n\r\nbody\r\n";
        let (headers, body) = split_message(raw);
        assert_eq!(
            headers,
            vec![
                ("Subject".to_string(), "a long subject".to_string()),
                ("To".to_string(), "x@y".to_string())
            ]
        );
        assert_eq!(body, b"body\r\n");
    }

    #[test]
    fn bare_lf_and_missing_body() {
        let (headers, body) = split_message(b"A: 1\nB: 2\n");
        assert_eq!(headers.len(), 2);
        assert!(body.is_empty());
    }
}
