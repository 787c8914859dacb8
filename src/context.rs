// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-operation context.
//!
//! Every ledger, registry and challenge operation receives an [`OpContext`]
//! naming the network it runs against and carrying the caller's cancellation
//! token and optional deadline. Operations check it before starting and again
//! right before committing; an abandoned write transaction is rolled back by
//! the storage engine.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{MintError, MintResult};
use crate::network::Network;

#[derive(Debug, Clone)]
pub struct OpContext {
    network: Network,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Tie the operation to an externally owned token (request or shutdown).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with [`MintError::Cancelled`] once cancelled or past the deadline.
    pub fn check(&self, operation: &'static str) -> MintResult<()> {
        if self.is_done() {
            tracing::debug!(operation, network = %self.network, "Operation context is done");
            return Err(MintError::Cancelled { operation });
        }
        Ok(())
    }
}
