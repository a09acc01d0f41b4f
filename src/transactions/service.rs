use super::watcher::TransactionWatcher;
use crate::{
    chains::ChainApi,
    config::RelayConfig,
    constants::DEFAULT_GAS_PRICE_TTL,
    metrics::periodic::spawn_balance_collector,
    price::{CachedGasOracle, ChainGasOracle},
    signers::DynSigner,
    storage::RelayStorage,
    transactions::{Signer, SignerPool},
};
use alloy::providers::{Provider, ProviderBuilder};
use std::{sync::Arc, time::Duration};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::info;

/// Drives the [`TransactionWatcher`] on a fixed interval.
///
/// Ticks run on a single task and each tick is awaited to completion before
/// the next one is scheduled, so two ticks never overlap and cannot
/// double-broadcast a record. The design assumes a single active service
/// instance per signer pool: nonce allocation is not fenced against
/// concurrent broadcasters.
#[derive(Debug)]
pub struct WatcherService;

impl WatcherService {
    /// Spawns the watcher loop.
    pub fn spawn(watcher: Arc<TransactionWatcher>, tick_interval: Duration) -> WatcherServiceHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => watcher.tick().await,
                    // Shutdown is only observed between ticks, letting an
                    // in-flight tick finish.
                    _ = &mut shutdown_rx => break,
                }
            }

            info!("transaction watcher stopped");
        });

        WatcherServiceHandle { shutdown: shutdown_tx, task }
    }

    /// Builds the full watcher stack from configuration and spawns it,
    /// together with the signer balance collector.
    ///
    /// The storage backend follows `config.database_url`: PostgreSQL when
    /// set, in-memory otherwise.
    pub async fn from_config(config: &RelayConfig) -> eyre::Result<WatcherServiceHandle> {
        let storage = RelayStorage::connect(config.database_url.as_deref()).await?;
        let provider = ProviderBuilder::new().connect_http(config.rpc_endpoint.clone()).erased();
        let chain: Arc<dyn ChainApi> = Arc::new(provider);
        let chain_id = chain.chain_id().await?;

        let signers = config
            .signer_keys
            .iter()
            .map(|key| {
                Ok(Signer::new(
                    chain.clone(),
                    DynSigner::from_signing_key(key)?,
                    chain_id,
                    config.watcher.gas_estimate_percent,
                ))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        let pool = Arc::new(SignerPool::new(signers));

        spawn_balance_collector(
            chain.clone(),
            pool.addresses().copied().collect(),
            config.watcher.balance_check_interval,
        );

        let oracle = Arc::new(CachedGasOracle::new(
            ChainGasOracle::new(chain.clone()),
            DEFAULT_GAS_PRICE_TTL,
        ));
        let watcher = Arc::new(TransactionWatcher::new(
            chain,
            storage,
            pool,
            oracle,
            config.watcher.clone(),
        ));

        Ok(Self::spawn(watcher, config.watcher.tick_interval))
    }
}

/// Handle to a spawned [`WatcherService`].
#[derive(Debug)]
pub struct WatcherServiceHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WatcherServiceHandle {
    /// Signals the service to stop and waits for the in-flight tick to
    /// finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}
