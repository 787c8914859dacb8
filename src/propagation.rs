// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance Propagation
//!
//! Keeps local advisory copies of balances whose canonical version lives on
//! another mint. Data only ever flows canonical → propagated: a refresh pulls
//! the owner's snapshot and overwrites the local copy, and nothing is pushed
//! back.
//!
//! A propagated copy is stale between refreshes. Callers that need the
//! authoritative value must ask the owning mint.
//!
//! ## Background worker
//!
//! [`PropagationWorker`] drains a bounded queue of refresh requests until its
//! cancellation token fires, following the same shutdown pattern as the other
//! background tasks:
//!
//! ```rust,ignore
//! let (handle, queue) = propagation_queue(256);
//! tokio::spawn(PropagationWorker::new(coordinator, queue).run(shutdown.clone()));
//! handle.notify(request)?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::LIVEMODE_HEADER;
use crate::config::MintConfig;
use crate::context::OpContext;
use crate::error::{MintError, MintResult};
use crate::network::Network;
use crate::storage::{check_asset_issuer, Balance, BalanceBackend, BalanceStore};

/// Timeout applied to every request to a peer mint.
const PEER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where canonical snapshots come from.
pub trait CanonicalSource: Send + Sync {
    /// Fetch the canonical balance of `(asset, holder)` from the mint `owner`.
    /// `Ok(None)` means the owner has no such balance.
    fn fetch_canonical(
        &self,
        ctx: &OpContext,
        owner: &str,
        asset: &str,
        holder: &str,
    ) -> impl Future<Output = MintResult<Option<Balance>>> + Send;
}

/// Reads canonical balances straight from other mints' backends in the same
/// process.
#[derive(Default, Clone)]
pub struct LocalCanonicalSource {
    mints: HashMap<String, Arc<dyn BalanceBackend>>,
}

impl LocalCanonicalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mint(mut self, address: impl Into<String>, backend: Arc<dyn BalanceBackend>) -> Self {
        self.mints.insert(address.into(), backend);
        self
    }
}

impl CanonicalSource for LocalCanonicalSource {
    async fn fetch_canonical(
        &self,
        ctx: &OpContext,
        owner: &str,
        asset: &str,
        holder: &str,
    ) -> MintResult<Option<Balance>> {
        let backend = self
            .mints
            .get(owner)
            .ok_or_else(|| MintError::validation("owner_unknown", format!("no mint {owner} is known")))?;
        BalanceStore::new(backend.as_ref(), owner).load_canonical_balance_by_asset_holder(
            ctx, asset, holder,
        )
    }
}

/// Fetches canonical balances from peer mints over HTTP.
#[derive(Clone)]
pub struct HttpCanonicalSource {
    client: reqwest::Client,
    /// Owner mint address → base URL
    peers: HashMap<String, String>,
}

impl HttpCanonicalSource {
    pub fn new(peers: HashMap<String, String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(PEER_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, peers))
    }

    pub fn with_client(client: reqwest::Client, peers: HashMap<String, String>) -> Self {
        Self { client, peers }
    }
}

impl CanonicalSource for HttpCanonicalSource {
    async fn fetch_canonical(
        &self,
        ctx: &OpContext,
        owner: &str,
        asset: &str,
        holder: &str,
    ) -> MintResult<Option<Balance>> {
        ctx.check("fetch_canonical")?;
        let base = self
            .peers
            .get(owner)
            .ok_or_else(|| MintError::validation("owner_unknown", format!("no peer URL for mint {owner}")))?;

        let request = self
            .client
            .get(format!("{base}/v1/balances/canonical"))
            .query(&[("asset", asset), ("holder", holder)])
            .header(LIVEMODE_HEADER, ctx.network().livemode().to_string())
            .send();

        let response = tokio::select! {
            response = request => response
                .map_err(|e| MintError::Internal(format!("peer {owner} unreachable: {e}")))?,
            _ = ctx.cancellation().cancelled() => {
                return Err(MintError::Cancelled { operation: "fetch_canonical" });
            }
        };

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MintError::Internal(format!(
                "peer {owner} answered HTTP {}",
                response.status()
            )));
        }

        let balance: Balance = response
            .json()
            .await
            .map_err(|e| MintError::Internal(format!("peer {owner} sent an invalid balance: {e}")))?;

        // A peer may only vouch for its own canonical balances.
        if balance.owner() != owner
            || balance.asset() != asset
            || balance.holder() != holder
            || !balance.is_canonical()
        {
            return Err(MintError::Internal(format!(
                "peer {owner} returned a balance for a different key"
            )));
        }
        Ok(Some(balance))
    }
}

/// Pulls canonical snapshots and stores them as local propagated copies.
pub struct PropagationCoordinator<S> {
    source: S,
    backend: Arc<dyn BalanceBackend>,
    config: Arc<MintConfig>,
}

impl<S: CanonicalSource> PropagationCoordinator<S> {
    pub fn new(source: S, backend: Arc<dyn BalanceBackend>, config: Arc<MintConfig>) -> Self {
        Self {
            source,
            backend,
            config,
        }
    }

    /// Refresh the local copy of `owner`'s canonical balance.
    ///
    /// Returns the stored copy, or `None` when the owner has no canonical
    /// balance for the pair.
    pub async fn refresh(
        &self,
        ctx: &OpContext,
        owner: &str,
        asset: &str,
        holder: &str,
    ) -> MintResult<Option<Balance>> {
        ctx.check("refresh_propagated_balance")?;
        let local_mint = self.config.network(ctx.network()).address();
        if owner == local_mint {
            return Err(MintError::validation(
                "balance_owner_invalid",
                "balances owned by this mint are canonical here",
            ));
        }
        check_asset_issuer(asset, owner)?;

        let Some(snapshot) = self.source.fetch_canonical(ctx, owner, asset, holder).await? else {
            debug!(owner, asset, holder, "Owner has no canonical balance to propagate");
            return Ok(None);
        };

        let store = BalanceStore::new(self.backend.as_ref(), local_mint);
        store.store_propagated_balance(ctx, &snapshot).map(Some)
    }
}

/// A request to refresh one propagated balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationRequest {
    pub network: Network,
    pub owner: String,
    pub asset: String,
    pub holder: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PropagationError {
    #[error("propagation queue is full")]
    QueueFull,

    #[error("propagation worker is not running")]
    Closed,
}

/// Cheap, cloneable sender side of the propagation queue.
#[derive(Debug, Clone)]
pub struct PropagationHandle {
    sender: mpsc::Sender<PropagationRequest>,
}

impl PropagationHandle {
    /// Enqueue a refresh without waiting. A full queue is reported to the
    /// caller, never dropped silently.
    pub fn notify(&self, request: PropagationRequest) -> Result<(), PropagationError> {
        self.sender.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(request) => {
                warn!(owner = %request.owner, asset = %request.asset, "Propagation queue full");
                PropagationError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => PropagationError::Closed,
        })
    }
}

/// Receiver side of the propagation queue, consumed by the worker.
#[derive(Debug)]
pub struct PropagationQueue {
    receiver: mpsc::Receiver<PropagationRequest>,
}

#[cfg(test)]
impl PropagationQueue {
    pub fn try_recv(&mut self) -> Option<PropagationRequest> {
        self.receiver.try_recv().ok()
    }
}

/// Create a bounded propagation queue.
pub fn propagation_queue(capacity: usize) -> (PropagationHandle, PropagationQueue) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (PropagationHandle { sender }, PropagationQueue { receiver })
}

/// Background task applying queued refresh requests.
pub struct PropagationWorker<S> {
    coordinator: PropagationCoordinator<S>,
    queue: PropagationQueue,
}

impl<S: CanonicalSource> PropagationWorker<S> {
    pub fn new(coordinator: PropagationCoordinator<S>, queue: PropagationQueue) -> Self {
        Self { coordinator, queue }
    }

    /// Run until the token is cancelled or every handle is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Propagation worker starting");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Propagation worker shutting down");
                    return;
                }
                request = self.queue.receiver.recv() => match request {
                    Some(request) => self.process(request, &shutdown).await,
                    None => {
                        info!("Propagation queue closed, worker stopping");
                        return;
                    }
                },
            }
        }
    }

    async fn process(&self, request: PropagationRequest, shutdown: &CancellationToken) {
        let ctx = OpContext::new(request.network)
            .with_cancellation(shutdown.child_token())
            .with_timeout(PEER_REQUEST_TIMEOUT * 2);

        match self
            .coordinator
            .refresh(&ctx, &request.owner, &request.asset, &request.holder)
            .await
        {
            Ok(Some(balance)) => info!(
                network = %request.network,
                owner = %request.owner,
                token = %balance.token(),
                value = %balance.value(),
                "Propagated balance refreshed"
            ),
            Ok(None) => debug!(
                network = %request.network,
                owner = %request.owner,
                asset = %request.asset,
                holder = %request.holder,
                "Nothing to propagate"
            ),
            Err(e) => warn!(
                network = %request.network,
                owner = %request.owner,
                error = %e,
                "Propagation refresh failed"
            ),
        }
    }
}
