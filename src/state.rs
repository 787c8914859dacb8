// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::MintConfig;
use crate::context::OpContext;
use crate::network::Network;
use crate::propagation::PropagationHandle;
use crate::registration::{AccountDirectory, AttestationFactChecker, KnownAccounts};
use crate::storage::{BalanceBackend, FactRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MintConfig>,
    pub backend: Arc<dyn BalanceBackend>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub propagation: PropagationHandle,
    /// Cancelled on shutdown; request contexts derive child tokens from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Arc<MintConfig>,
        backend: Arc<dyn BalanceBackend>,
        propagation: PropagationHandle,
        shutdown: CancellationToken,
    ) -> Self {
        let accounts = Arc::new(KnownAccounts::from_config(&config));
        Self {
            config,
            backend,
            accounts,
            propagation,
            shutdown,
        }
    }

    /// Operation context for a request on `network`, cancelled on shutdown.
    pub fn context(&self, network: Network) -> OpContext {
        OpContext::new(network).with_cancellation(self.shutdown.child_token())
    }

    /// Fact checker over the attestations persisted for `network`.
    pub fn fact_checker(&self, network: Network) -> AttestationFactChecker<'_> {
        AttestationFactChecker::new(
            self.config.network(network),
            FactRepository::new(self.backend.as_ref()),
        )
    }
}

#[cfg(test)]
impl AppState {
    /// State over an in-memory backend with fresh keys on both networks.
    ///
    /// The propagation queue is returned so tests can observe requests.
    pub fn for_config(config: MintConfig) -> (Self, crate::propagation::PropagationQueue) {
        let (handle, queue) = crate::propagation::propagation_queue(config.propagation_queue);
        let state = Self::new(
            Arc::new(config),
            Arc::new(crate::storage::MemoryBackend::new()),
            handle,
            CancellationToken::new(),
        );
        (state, queue)
    }

    pub fn for_tests() -> Self {
        Self::for_config(test_config()).0
    }
}

#[cfg(test)]
pub fn test_config() -> MintConfig {
    use crate::auth::Keypair;
    use crate::config::NetworkConfig;

    MintConfig::new(
        NetworkConfig::new(Network::Test, Keypair::generate()),
        NetworkConfig::new(Network::Live, Keypair::generate()),
    )
}
