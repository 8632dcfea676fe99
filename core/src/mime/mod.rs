/*
 * mod.rs
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

//! RFC 5322 / MIME helpers used by the mail binding.

mod address;
mod header;
mod message_id_list;
mod quoted_printable;

pub use address::{mailbox_address, parse_address_list};
pub use header::{sanitize_value, split_message};
pub use message_id_list::parse_message_id_list;
pub use quoted_printable::decode as decode_quoted_printable;
