//! Wires the shard registry, the background health monitor, and the
//! replication dispatcher behind one `Hub` type and the `BlobHub` trait
//! boundary that an external API layer (HTTP routes, WebSocket streaming,
//! the relational catalog) would call through.

pub mod config;

use std::future::Future;
use std::sync::Arc;

use hub_dispatcher::{DispatchError, Dispatcher, StoreOutcome};
use hub_health::HealthMonitor;
use hub_registry::{Registry, ShardStatus};
use tokio::task::JoinHandle;
use wire::{Digest, ShardAddress};

/// The trait boundary an external API bridge (HTTP/WebSocket surface, not
/// part of this crate) calls through to operate on the shard fleet.
#[async_trait::async_trait]
pub trait BlobHub: Send + Sync {
    async fn store(&self, payload: Vec<u8>) -> Result<StoreOutcome, DispatchError>;
    async fn reconstruct(&self, digest: Digest) -> Result<Vec<u8>, DispatchError>;
    async fn destroy(&self, digest: Digest);
    async fn register(&self, address: ShardAddress);
    fn snapshot(&self) -> Vec<ShardStatus>;
}

/// The concrete, in-process implementation of [`BlobHub`].
pub struct Hub {
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
}

impl Hub {
    pub fn new(config: &config::HubConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            config.hmac_secret.clone(),
            config.chunks_per_file,
            config.replicas,
        );
        Self { registry, dispatcher }
    }

    /// Starts the background health monitor, returning its `JoinHandle` so
    /// the caller's `main` can await it alongside process shutdown.
    pub fn spawn_health_monitor(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> JoinHandle<()> {
        HealthMonitor::run(Arc::clone(&self.registry), shutdown)
    }
}

#[async_trait::async_trait]
impl BlobHub for Hub {
    async fn store(&self, payload: Vec<u8>) -> Result<StoreOutcome, DispatchError> {
        self.dispatcher.store(payload).await
    }

    async fn reconstruct(&self, digest: Digest) -> Result<Vec<u8>, DispatchError> {
        self.dispatcher.reconstruct(digest).await
    }

    async fn destroy(&self, digest: Digest) {
        self.dispatcher.destroy(digest).await
    }

    async fn register(&self, address: ShardAddress) {
        self.dispatcher.register(address);
    }

    fn snapshot(&self) -> Vec<ShardStatus> {
        self.registry.snapshot()
    }
}
