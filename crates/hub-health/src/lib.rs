//! The hub's background health monitor: pings every known shard on a fixed
//! cadence and evicts shards that stay unreachable past a threshold.
//!
//! Modeled as a supervised task the same way `automations::server::serve`
//! is: a `tokio::select!` between a tick interval and a caller-supplied
//! shutdown future, so the monitor stops cleanly instead of running as an
//! unkillable daemon.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hub_registry::Registry;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use wire::{codec, ShardAddress};

pub const TICK_INTERVAL: Duration = Duration::from_secs(3);
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);
pub const EVICTION_THRESHOLD: Duration = Duration::from_secs(300);

pub struct HealthMonitor;

impl HealthMonitor {
    /// Spawns the monitor loop, returning its `JoinHandle` so callers can
    /// await it alongside the rest of process shutdown.
    pub fn run(registry: Arc<Registry>, shutdown: impl Future<Output = ()> + Send + 'static) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::pin!(shutdown);
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep(&registry).await;
                    }
                    _ = &mut shutdown => {
                        tracing::info!("health monitor shutting down");
                        return;
                    }
                }
            }
        })
    }
}

async fn sweep(registry: &Registry) {
    for address in registry.addresses() {
        match ping(&address).await {
            Ok(reported_bytes) => {
                tracing::debug!(%address, "shard healthy");
                registry.mark_healthy(&address, reported_bytes);
            }
            Err(err) => {
                tracing::debug!(%address, %err, "shard ping failed");
                registry.mark_unhealthy(&address);
                if let Some(status) = registry.get(&address) {
                    if seconds_since(status.last_seen_secs) > EVICTION_THRESHOLD.as_secs() {
                        tracing::warn!(%address, "evicting unreachable shard");
                        registry.remove(&address);
                    }
                }
            }
        }
    }
}

fn seconds_since(last_seen_secs: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(last_seen_secs);
    now.saturating_sub(last_seen_secs)
}

async fn ping(address: &ShardAddress) -> std::io::Result<u64> {
    let connect = TcpStream::connect(address.to_socket_string());
    let mut socket = tokio::time::timeout(PING_TIMEOUT, connect)
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;

    let roundtrip = async {
        codec::write_ping_request(&mut socket).await?;
        codec::read_ping_response(&mut socket)
            .await
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))
    };
    tokio::time::timeout(PING_TIMEOUT, roundtrip)
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "ping timed out"))?
        .map(u64::from)
}
