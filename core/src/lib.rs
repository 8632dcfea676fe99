/*
 * lib.rs
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

//! Corriere: request/response message exchange over HTTP, message queues
//! and email, behind one connection contract.
//!
//! Senders open an outbound connection per exchange (`transport`), receivers
//! turn each inbound event into an inbound connection handed to a
//! `server::MessageHandler`. Bindings and wire clients live in `protocol`.

pub mod config;
pub mod message_id;
pub mod mime;
pub mod net;
pub mod protocol;
pub mod sasl;
pub mod server;
pub mod transport;
pub mod uri;
