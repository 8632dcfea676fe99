/*
 * dot_stuffer.rs
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

//! Dot stuffing for SMTP DATA (RFC 5321 section 4.5.2: a line starting with . gets an extra .).

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the start of a line (message start or just after CRLF).
    LineStart,
    Normal,
    SawCr,
}

/// Streaming dot stuffer. Input may be split across chunks at any byte.
pub struct DotStuffer {
    state: State,
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self { state: State::LineStart }
    }
}

impl DotStuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk; call `out` for each slice to send.
    pub fn process_chunk<F>(&mut self, chunk: &[u8], mut out: F)
    where
        F: FnMut(&[u8]),
    {
        let mut start = 0;
        for (i, &b) in chunk.iter().enumerate() {
            if self.state == State::LineStart && b == b'.' {
                if start < i {
                    out(&chunk[start..i]);
                }
                out(b".");
                start = i;
            }
            self.state = match (self.state, b) {
                (_, b'\r') => State::SawCr,
                (State::SawCr, b'\n') => State::LineStart,
                _ => State::Normal,
            };
        }
        if start < chunk.len() {
            out(&chunk[start..]);
        }
    }

    /// Complete the last line if needed, emit the terminator, and reset.
    pub fn end_message<F>(&mut self, mut out: F)
    where
        F: FnMut(&[u8]),
    {
        match self.state {
            State::LineStart => out(b".\r\n"),
            State::SawCr => out(b"\n.\r\n"),
            State::Normal => out(b"\r\n.\r\n"),
        }
        self.state = State::LineStart;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stuff(chunks: &[&[u8]]) -> Vec<u8> {
        let mut s = DotStuffer::new();
        let mut out = Vec::new();
        for c in chunks {
            s.process_chunk(c, |x| out.extend_from_slice(x));
        }
        s.end_message(|x| out.extend_from_slice(x));
        out
    }

    #[test]
    fn leading_dot_of_message_is_doubled() {
        assert_eq!(stuff(&[b".\r\n"]), b"..\r\n.\r\n");
    }

    #[test]
    fn empty_message_is_just_terminator() {
        assert_eq!(stuff(&[]), b".\r\n");
    }

    #[test]
    fn dot_line_in_middle_is_stuffed() {
        assert_eq!(stuff(&[b"Hi\r\n.\r\nBye"]), b"Hi\r\n..\r\nBye\r\n.\r\n");
    }

    #[test]
    fn dot_split_across_chunks() {
        assert_eq!(stuff(&[b"a\r", b"\n", b".b\r\n"]), b"a\r\n..b\r\n.\r\n");
    }

    #[test]
    fn inner_dots_untouched() {
        assert_eq!(stuff(&[b"a.b\r\n"]), b"a.b\r\n.\r\n");
    }
}
