/*
 * quoted_printable.rs
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

//! Quoted-Printable decoding for Content-Transfer-Encoding (RFC 2045 section 6.7).

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

/// Decode a complete quoted-printable body. Handles `=XX` and soft line
/// breaks (`=CRLF`, `=LF`); a malformed `=` sequence is kept literally.
pub fn decode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut pos = 0;
    while pos < src.len() {
        let b = src[pos];
        if b != b'=' {
            out.push(b);
            pos += 1;
            continue;
        }
        let rest = &src[pos + 1..];
        match rest {
            [b'\r', b'\n', ..] => pos += 3,
            [b'\n', ..] => pos += 2,
            [h1, h2, ..] if HEX_DECODE[*h1 as usize] >= 0 && HEX_DECODE[*h2 as usize] >= 0 => {
                out.push(((HEX_DECODE[*h1 as usize] << 4) | HEX_DECODE[*h2 as usize]) as u8);
                pos += 3;
            }
            _ => {
                out.push(b);
                pos += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::decode;

    #[test]
    fn hex_escapes() {
        assert_eq!(decode(b"caf=C3=A9"), "café".as_bytes());
        assert_eq!(decode(b"a=3db"), b"a=b");
    }

    #[test]
    fn soft_line_breaks_are_removed() {
        assert_eq!(decode(b"long=\r\nline"), b"longline");
        assert_eq!(decode(b"long=\nline"), b"longline");
    }

    #[test]
    fn stray_equals_kept() {
        assert_eq!(decode(b"x=zz"), b"x=zz");
        assert_eq!(decode(b"end="), b"end=");
    }
}
