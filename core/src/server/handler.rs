/*
 * handler.rs
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

use async_trait::async_trait;
use tracing::warn;

use crate::transport::{InboundConnection, TransportError};

/// Consumes one inbound connection; may reply on it or not.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, connection: &mut InboundConnection) -> Result<(), TransportError>;
}

/// Hand `connection` to `handler`, then close it whatever happened.
pub async fn dispatch(handler: &dyn MessageHandler, connection: &mut InboundConnection) -> Result<(), TransportError> {
    let handled = handler.handle(connection).await;
    let closed = connection.close().await;
    match (handled, closed) {
        (Ok(()), closed) => closed,
        (Err(e), Err(close_err)) => {
            warn!(transport = %connection.kind(), error = %close_err, "failed to close connection after handler error");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}
