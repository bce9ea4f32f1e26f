//! Registry of live subscribers and best-effort fan-out
//!
//! Broadcast takes a snapshot of the membership and then pushes to each
//! subscriber outside of any map lock, so concurrent add/remove never waits
//! on a send. A subscriber whose send fails is removed and the pass goes on.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::broadcast::subscriber::{Payload, Subscriber, SubscriberId};
use crate::protocol::GazeSample;

/// Live set of push destinations
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Arc<dyn Subscriber>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Outcome of one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a subscriber; returns false if it was already present
    pub fn add(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let id = subscriber.id();
        let mut inserted = false;
        self.subscribers.entry(id).or_insert_with(|| {
            inserted = true;
            subscriber
        });

        if inserted {
            tracing::debug!("Subscriber {} registered ({} live)", id, self.len());
        }
        inserted
    }

    /// Deregister a subscriber; returns false if it was not present
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!("Subscriber {} removed ({} live)", id, self.len());
        }
        removed
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Push a sample to every subscriber
    pub fn broadcast(&self, sample: &GazeSample) -> BroadcastReport {
        if self.subscribers.is_empty() {
            return BroadcastReport::default();
        }

        match serde_json::to_string(sample) {
            Ok(json) => self.broadcast_payload(Payload::from(json)),
            Err(e) => {
                tracing::warn!("Failed to serialize sample: {}", e);
                BroadcastReport::default()
            }
        }
    }

    /// Push an already serialized payload to every subscriber
    pub fn broadcast_payload(&self, payload: Payload) -> BroadcastReport {
        let targets: Vec<Arc<dyn Subscriber>> = self
            .subscribers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut report = BroadcastReport::default();
        for subscriber in targets {
            match subscriber.send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!("Dropping subscriber {}: {}", subscriber.id(), e);
                    self.remove(subscriber.id());
                    report.dropped += 1;
                }
            }
        }

        self.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live: self.len(),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    pub live: usize,
    pub delivered: u64,
    pub dropped: u64,
}
