/*
 * address.rs
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

//! RFC 5322 address list parsing (From, To, Reply-To).

/// Extract the bare `local@domain` addresses from an address-list header
/// value. Accepts `"Display Name" <local@domain>`, `Name <local@domain>`
/// and bare `local@domain`. Entries without an `@` are skipped.
pub fn parse_address_list(value: &str) -> Vec<String> {
    let bytes = value.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();
    let mut pos = 0;
    let mut start = 0;
    let mut in_quotes = false;
    let mut depth = 0usize;

    // split on top-level commas
    while pos <= len {
        let at_end = pos == len;
        let b = if at_end { b',' } else { bytes[pos] };
        match b {
            b'\\' if in_quotes => pos += 1,
            b'"' => in_quotes = !in_quotes,
            b'<' if !in_quotes => depth += 1,
            b'>' if !in_quotes => depth = depth.saturating_sub(1),
            b',' if (!in_quotes && depth == 0) || at_end => {
                if let Some(addr) = mailbox_address(&value[start..pos.min(len)]) {
                    out.push(addr);
                }
                start = pos + 1;
            }
            _ => {}
        }
        pos += 1;
    }
    out
}

/// Bare address of a single mailbox, or `None` when it has no `@`.
pub fn mailbox_address(mailbox: &str) -> Option<String> {
    let mailbox = mailbox.trim();
    let addr = match (mailbox.rfind('<'), mailbox.rfind('>')) {
        (Some(open), Some(close)) if open < close => &mailbox[open + 1..close],
        _ => mailbox,
    };
    let addr = addr.trim();
    let (local, domain) = addr.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(addr.to_string())
}
