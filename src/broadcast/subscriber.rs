//! Push destinations for live gaze samples

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;

/// Serialized message shared by every subscriber of one broadcast
pub type Payload = Arc<str>;

/// Unique subscriber identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live push handle
///
/// `send` must not block: a transport that cannot accept the payload right
/// away reports an error and gets dropped from the registry.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    fn send(&self, payload: Payload) -> Result<(), TransportError>;
}

/// Subscriber backed by a bounded queue drained by a writer task
pub struct ChannelSubscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Payload>,
    label: String,
    sent: AtomicU64,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiving end its writer should drain
    pub fn new(label: impl Into<String>, depth: usize) -> (Self, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let subscriber = Self {
            id: SubscriberId::new(),
            tx,
            label: label.into(),
            sent: AtomicU64::new(0),
        };
        (subscriber, rx)
    }

    /// Payloads accepted so far
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Subscriber for ChannelSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn send(&self, payload: Payload) -> Result<(), TransportError> {
        match self.tx.try_send(payload) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("{} subscriber {} fell behind", self.label, self.id);
                Err(TransportError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }
}
