//! Live fan-out of gaze samples to connected viewers

pub mod registry;
pub mod subscriber;

pub use registry::{BroadcastReport, RegistryStats, SubscriberRegistry};
pub use subscriber::{ChannelSubscriber, Payload, Subscriber, SubscriberId};
