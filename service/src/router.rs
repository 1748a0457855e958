//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Outbound routing of upstream commands and responses

use crate::{BasestationRegistry, BssciError, Result, ServerMetrics};
use bssci_codec::{ServerCommand, ServerResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Cloneable handle for pushing upstream traffic to basestations
#[derive(Debug, Clone)]
pub struct OutboundRouter {
    registry: Arc<BasestationRegistry>,
    metrics: Arc<ServerMetrics>,
    write_timeout: Duration,
}

impl OutboundRouter {
    /// Create a router over `registry`
    pub fn new(
        registry: Arc<BasestationRegistry>,
        metrics: Arc<ServerMetrics>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metrics,
            write_timeout,
        }
    }

    /// Send a service center command to its basestation
    ///
    /// The message is stamped with the next server opId of the target
    /// connection, which is returned.
    #[instrument(skip(self, command), fields(bs_eui = %command.bs_eui))]
    pub async fn handle_server_command(&self, command: ServerCommand) -> Result<i64> {
        let mut message = command.to_message()?;
        let connection = self
            .registry
            .get(command.bs_eui)
            .ok_or(BssciError::NotConnected(command.bs_eui))?;

        let op_id = connection.next_op_id();
        message.set_op_id(op_id);
        connection.track_operation(op_id, &message);

        if let Err(e) = connection.write(&message, self.write_timeout).await {
            connection.complete_operation(op_id);
            if matches!(e, BssciError::WriteTimeout(_)) {
                self.metrics.timeout_error();
            }
            warn!(command = message.command(), op_id, error = %e, "Server command not sent");
            return Err(e);
        }

        self.metrics.message_sent();
        debug!(command = message.command(), op_id, "Server command sent");
        Ok(op_id)
    }

    /// Send an upstream answer to a basestation-initiated operation
    #[instrument(skip(self, response), fields(bs_eui = %response.bs_eui, op_id = response.op_id))]
    pub async fn handle_server_response(&self, response: ServerResponse) -> Result<()> {
        let message = response.to_message()?;
        let connection = self
            .registry
            .get(response.bs_eui)
            .ok_or(BssciError::NotConnected(response.bs_eui))?;

        if let Err(e) = connection.write(&message, self.write_timeout).await {
            if matches!(e, BssciError::WriteTimeout(_)) {
                self.metrics.timeout_error();
            }
            warn!(command = message.command(), error = %e, "Server response not sent");
            return Err(e);
        }

        self.metrics.message_sent();
        debug!(command = message.command(), "Server response sent");
        Ok(())
    }
}
