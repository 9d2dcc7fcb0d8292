pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod offline;
pub mod opts;
pub mod report;

pub use engine::{
    clamp_qos, ClientHandle, EngineFactory, MessageHandler, ProtocolEngine, TopicMessage,
    QOS_AT_LEAST_ONCE, QOS_AT_MOST_ONCE, QOS_EXACTLY_ONCE,
};
pub use error::{LinkError, LinkResult};
pub use lifecycle::{ConnectObserver, MqttLifecycle, SUBSCRIBE_SYNC_TIMEOUT_MAX_MS};
pub use offline::{DeferredSubscription, OfflineQueue, DEFAULT_OFFLINE_CAPACITY};
pub use opts::{ConnectParams, ConnectParamsBuilder};
