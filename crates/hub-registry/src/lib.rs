//! The hub's shared, concurrently-read-and-written table of known shards.
//!
//! Backed by a single `Mutex<IndexMap<..>>`, the same shape as
//! `gazette::Router`'s member table: one lock guarding an ordered map, with
//! callers cloning out what they need rather than holding the lock across
//! an `await`. `IndexMap` is load-bearing here, not cosmetic — placement
//! and reconstruction both walk shards in registration order, and a plain
//! `HashMap` would make that order nondeterministic across processes.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use wire::ShardAddress;

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unreachable,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct ShardStatus {
    pub address: ShardAddress,
    pub state: HealthState,
    /// Seconds since the Unix epoch when this shard last answered a PING.
    pub last_seen_secs: u64,
    /// The byte count the shard last reported on a successful PING.
    pub reported_bytes: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Default)]
pub struct Registry {
    shards: Mutex<IndexMap<ShardAddress, ShardStatus>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shard if it is not already known. A freshly registered shard
    /// starts unhealthy with nothing reported, per `spec.md` §4.3 — it only
    /// becomes healthy once the health monitor's next sweep pings it
    /// successfully. `last_seen_secs` is seeded to the registration time (not
    /// the `0` the original hub used) so the 300s eviction threshold is
    /// counted from registration rather than from the Unix epoch.
    /// Re-registering an existing address is a no-op for its position in
    /// iteration order (the map key is unchanged).
    pub fn register(&self, address: ShardAddress) {
        let mut shards = self.shards.lock().unwrap();
        shards.entry(address.clone()).or_insert_with(|| ShardStatus {
            address,
            state: HealthState::Unreachable,
            last_seen_secs: now_secs(),
            reported_bytes: 0,
        });
    }

    pub fn mark_healthy(&self, address: &ShardAddress, reported_bytes: u64) {
        let mut shards = self.shards.lock().unwrap();
        if let Some(status) = shards.get_mut(address) {
            status.state = HealthState::Healthy;
            status.last_seen_secs = now_secs();
            status.reported_bytes = reported_bytes;
        }
    }

    pub fn mark_unhealthy(&self, address: &ShardAddress) {
        let mut shards = self.shards.lock().unwrap();
        if let Some(status) = shards.get_mut(address) {
            status.state = HealthState::Unreachable;
        }
    }

    /// Evicts a shard entirely (called by the health monitor once a shard
    /// has been unreachable past the eviction threshold).
    pub fn remove(&self, address: &ShardAddress) -> bool {
        self.shards.lock().unwrap().shift_remove(address).is_some()
    }

    pub fn get(&self, address: &ShardAddress) -> Option<ShardStatus> {
        self.shards.lock().unwrap().get(address).cloned()
    }

    /// Known shard addresses in registration order — the order placement
    /// and reconstruction both walk.
    pub fn addresses(&self) -> Vec<ShardAddress> {
        self.shards.lock().unwrap().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<ShardStatus> {
        self.shards.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shards.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> ShardAddress {
        ShardAddress::new("127.0.0.1", port)
    }

    #[test]
    fn register_is_idempotent_and_preserves_order() {
        let registry = Registry::new();
        registry.register(addr(1));
        registry.register(addr(2));
        registry.register(addr(1));
        assert_eq!(registry.addresses(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn freshly_registered_shard_starts_unhealthy() {
        let registry = Registry::new();
        registry.register(addr(1));
        let status = registry.get(&addr(1)).unwrap();
        assert_eq!(status.state, HealthState::Unreachable);
        assert_eq!(status.reported_bytes, 0);
    }

    #[test]
    fn mark_unhealthy_then_healthy_round_trips_state() {
        let registry = Registry::new();
        registry.register(addr(1));
        registry.mark_unhealthy(&addr(1));
        assert_eq!(registry.get(&addr(1)).unwrap().state, HealthState::Unreachable);
        registry.mark_healthy(&addr(1), 128);
        let status = registry.get(&addr(1)).unwrap();
        assert_eq!(status.state, HealthState::Healthy);
        assert_eq!(status.reported_bytes, 128);
    }

    #[test]
    fn remove_evicts_and_is_reflected_in_snapshot() {
        let registry = Registry::new();
        registry.register(addr(1));
        registry.register(addr(2));
        assert!(registry.remove(&addr(1)));
        assert_eq!(registry.snapshot().len(), 1);
        assert!(!registry.remove(&addr(1)));
    }
}
