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

//! Transport contract: one request/response exchange per connection,
//! whatever the binding underneath.

mod client;
mod connection;
mod error;
mod headers;
mod kinds;
mod message;
mod state;
mod variant;

pub use client::{MessageClient, MessageSender};
pub use connection::{ReceiverBinding, ReceiverConnection, SenderBinding, SenderConnection, WireMessage};
pub use error::{NativeError, TransportError};
pub use headers::TransportHeaders;
pub use kinds::TransportKind;
pub use message::{DefaultMessageFactory, Message, MessageFactory};
pub use state::{ExchangeState, Role};
pub use variant::{InboundConnection, OutboundConnection};
