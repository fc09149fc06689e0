//! Replication placement, reconstruction, and deletion against the shard
//! fleet. This is the component that turns a registry of shard addresses
//! and an uploaded payload into chunks scattered across `REPLICAS` shards
//! apiece, and back again.

pub mod chunking;
pub mod client;

use std::sync::Arc;

use hub_registry::Registry;
use rand::seq::SliceRandom;
use wire::{Digest, ShardAddress};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("reconstruction failed: chunk {0} could not be retrieved from any shard")]
    ReconstructionFailed(usize),
    #[error(transparent)]
    Client(#[from] client::ClientError),
    #[error(transparent)]
    EmptySecret(#[from] chunking::EmptySecret),
}

/// The outcome of a `store` call. The digest is always produced — storing
/// never fails outright — but any chunk that did not reach `REPLICAS`
/// successful placements is reported so a caller may choose to warn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub digest: Digest,
    pub under_replicated: Vec<usize>,
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    hmac_secret: Vec<u8>,
    chunks_per_file: usize,
    replicas: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, hmac_secret: Vec<u8>, chunks_per_file: usize, replicas: usize) -> Self {
        Self {
            registry,
            hmac_secret,
            chunks_per_file,
            replicas,
        }
    }

    pub fn register(&self, address: ShardAddress) {
        self.registry.register(address);
    }

    /// Splits `payload` into `chunks_per_file` chunks and replicates each
    /// one onto up to `replicas` randomly chosen shards. Never fails: a
    /// chunk that could not reach full replication — including every chunk,
    /// if no shards are registered at all — is merely reported via
    /// `under_replicated`, matching `hub.py::send`'s `random.sample` over an
    /// empty shard list, which is simply a no-op loop.
    pub async fn store(&self, payload: Vec<u8>) -> Result<StoreOutcome, DispatchError> {
        let digest = chunking::digest(&self.hmac_secret, &payload)?;
        let chunks = chunking::split(&payload, self.chunks_per_file);

        let mut known = self.registry.addresses();
        let mut under_replicated = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            known.shuffle(&mut rand::thread_rng());

            let mut successes = 0usize;
            for address in &known {
                if successes >= self.replicas {
                    break;
                }
                match client::store_chunk(address, index as u32, digest.as_bytes(), chunk).await {
                    Ok(true) => successes += 1,
                    Ok(false) => {}
                    Err(err) => tracing::debug!(%address, %err, chunk = index, "store failed"),
                }
            }
            if successes < self.replicas {
                under_replicated.push(index);
            }
        }

        Ok(StoreOutcome {
            digest,
            under_replicated,
        })
    }

    /// Reconstructs the original payload for `digest` by retrieving each
    /// chunk from the first shard (in registration order) that has it.
    /// Fails fast on the first chunk no shard can produce.
    pub async fn reconstruct(&self, digest: Digest) -> Result<Vec<u8>, DispatchError> {
        let known = self.registry.addresses();
        let mut payload = Vec::new();

        for index in 0..self.chunks_per_file {
            let mut found = None;
            for address in &known {
                match client::retrieve_chunk(address, index as u32, digest.as_bytes()).await {
                    Ok(Some(chunk)) => {
                        found = Some(chunk);
                        break;
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::debug!(%address, %err, chunk = index, "retrieve failed");
                        continue;
                    }
                }
            }
            match found {
                Some(chunk) => payload.extend_from_slice(&chunk),
                None => return Err(DispatchError::ReconstructionFailed(index)),
            }
        }

        Ok(payload)
    }

    /// Broadcasts a delete for `digest` to every known shard concurrently.
    /// Per-shard failures are logged and otherwise ignored: there is no
    /// ordering requirement and nothing downstream depends on it.
    pub async fn destroy(&self, digest: Digest) {
        let known = self.registry.addresses();
        let deletes = known.iter().map(|address| {
            let digest = digest;
            async move {
                if let Err(err) = client::delete_digest(address, digest.as_bytes()).await {
                    tracing::debug!(%address, %err, "delete failed");
                }
            }
        });
        futures::future::join_all(deletes).await;
    }
}
