/*
 * receiver.rs
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

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::transport::TransportError;

/// Running queue or mail receiver. Dropping the handle also stops it.
pub struct ReceiverHandle {
    name: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReceiverHandle {
    pub fn new(name: impl Into<String>, stop: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            stop,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the loop and wait for it, including its in-flight handlers.
    pub async fn stop(self) -> Result<(), TransportError> {
        debug!(receiver = %self.name, "stop requested");
        // the loop may already have exited, dropping its receiver
        let _ = self.stop.send(true);
        self.task
            .await
            .map_err(|e| TransportError::io(format!("stop receiver {}", self.name), e))
    }
}
