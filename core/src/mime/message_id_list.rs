/*
 * message_id_list.rs
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

//! RFC 5322 msg-id list parsing (References, In-Reply-To).

/// Parse a list of msg-ids from a header value. Whitespace, comments and
/// commas separate entries. Ids are returned with their angle brackets.
/// Returns `None` when an entry is not bracketed or not terminated.
pub fn parse_message_id_list(value: &str) -> Option<Vec<String>> {
    let bytes = value.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < len {
        skip_cfws(bytes, &mut pos);
        if pos >= len {
            break;
        }
        if bytes[pos] != b'<' {
            return None;
        }
        let start = pos + 1;
        let end = start + value[start..].find('>')?;
        pos = end + 1;
        let inner = value[start..end].trim();
        match inner.split_once('@') {
            Some((local, domain)) if !local.trim().is_empty() && !domain.trim().is_empty() => {
                out.push(format!("<{}@{}>", local.trim(), domain.trim()));
            }
            // obsolete or malformed id: skipped
            _ => {}
        }
    }
    Some(out)
}

fn skip_cfws(bytes: &[u8], pos: &mut usize) {
    let len = bytes.len();
    while *pos < len {
        match bytes[*pos] {
            b' ' | b'\t' | b'\r' | b'\n' | b',' => *pos += 1,
            b'(' => {
                *pos += 1;
                let mut depth = 1;
                while *pos < len && depth > 0 {
                    match bytes[*pos] {
                        b'(' => depth += 1,
                        b')' => depth -= 1,
                        b'\\' if *pos + 1 < len => *pos += 1,
                        _ => {}
                    }
                    *pos += 1;
                }
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_message_id_list;

    #[test]
    fn references_with_comments_and_folding() {
        let ids = parse_message_id_list("<a@x.org> (first)\r\n <b@y.org>,<c@z.org>").unwrap();
        assert_eq!(ids, vec!["<a@x.org>", "<b@y.org>", "<c@z.org>"]);
    }

    #[test]
    fn empty_value_is_empty_list() {
        assert_eq!(parse_message_id_list("  ").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn unbracketed_is_rejected() {
        assert!(parse_message_id_list("a@x.org").is_none());
        assert!(parse_message_id_list("<a@x.org").is_none());
    }

    #[test]
    fn id_without_domain_is_skipped() {
        assert_eq!(parse_message_id_list("<nodomain> <a@b>").unwrap(), vec!["<a@b>"]);
    }
}
