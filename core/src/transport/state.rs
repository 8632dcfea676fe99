/*
 * state.rs
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

//! Exchange state machine shared by sender and receiver connections.
//!
//! Sender: `Created → RequestWritten → AwaitingReply → Complete → Closed`.
//! Receiver: starts in `AwaitingReply` (the inbound event is the request),
//! then `ReplyWritten → Complete → Closed`. Any state may go to `Closed`.

use std::fmt;

use crate::transport::error::TransportError;

/// Which side of an exchange a connection drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Created,
    RequestWritten,
    AwaitingReply,
    ReplyWritten,
    Complete,
    Closed,
}

impl ExchangeState {
    /// Initial state for a connection of the given role.
    pub fn initial(role: Role) -> Self {
        match role {
            Role::Sender => ExchangeState::Created,
            Role::Receiver => ExchangeState::AwaitingReply,
        }
    }

    fn allows(self, role: Role, to: ExchangeState) -> bool {
        use ExchangeState::*;
        if to == Closed {
            return self != Closed;
        }
        match role {
            Role::Sender => matches!(
                (self, to),
                (Created, RequestWritten) | (RequestWritten, AwaitingReply) | (AwaitingReply, Complete)
            ),
            Role::Receiver => matches!(
                (self, to),
                (AwaitingReply, ReplyWritten) | (ReplyWritten, Complete)
            ),
        }
    }

    /// Move to `to`, or fail with `IllegalState` if the edge does not exist for `role`.
    pub fn advance(&mut self, role: Role, to: ExchangeState) -> Result<(), TransportError> {
        if !self.allows(role, to) {
            return Err(TransportError::IllegalState(format!(
                "{:?} connection cannot go from {} to {}",
                role, self, to
            )));
        }
        *self = to;
        Ok(())
    }

    /// True once the exchange reached its final success state (or was closed after it).
    pub fn is_complete(self) -> bool {
        self == ExchangeState::Complete
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangeState::Created => "CREATED",
            ExchangeState::RequestWritten => "REQUEST_WRITTEN",
            ExchangeState::AwaitingReply => "AWAITING_REPLY",
            ExchangeState::ReplyWritten => "REPLY_WRITTEN",
            ExchangeState::Complete => "COMPLETE",
            ExchangeState::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}
