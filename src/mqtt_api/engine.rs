// SPDX-License-Identifier: MPL-2.0

//! The protocol-engine seam.
//!
//! The lifecycle layer never speaks MQTT on the wire; it drives an opaque
//! engine through the verbs below. An [`EngineFactory`] turns validated
//! [`ConnectParams`] into a not-yet-connected engine, and a
//! [`ClientHandle`] is the cloneable handle the rest of the API passes
//! around once the engine exists.

use std::fmt;
use std::sync::Arc;

use super::error::LinkResult;
use super::opts::ConnectParams;

/// QoS 0: fire and forget
pub const QOS_AT_MOST_ONCE: u8 = 0;
/// QoS 1: acknowledged delivery
pub const QOS_AT_LEAST_ONCE: u8 = 1;
/// QoS 2: assured delivery
pub const QOS_EXACTLY_ONCE: u8 = 2;

/// Normalize an out-of-range QoS value to QoS 0, with a warning.
///
/// Invalid values are accepted rather than rejected so a bad constant in
/// application code degrades delivery guarantees instead of breaking the
/// subscription.
pub fn clamp_qos(qos: u8) -> u8 {
    if qos > QOS_EXACTLY_ONCE {
        tracing::warn!(
            qos,
            "invalid qos out of [{}, {}], using {}",
            QOS_AT_MOST_ONCE,
            QOS_EXACTLY_ONCE,
            QOS_AT_MOST_ONCE
        );
        QOS_AT_MOST_ONCE
    } else {
        qos
    }
}

/// An MQTT application message: payload plus delivery flags
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopicMessage {
    pub qos: u8,
    pub retain: bool,
    pub dup: bool,
    pub payload: Vec<u8>,
}

impl TopicMessage {
    pub fn new(qos: u8, retain: bool, dup: bool, payload: Vec<u8>) -> Self {
        Self {
            qos,
            retain,
            dup,
            payload,
        }
    }

    /// Plain payload at the given QoS, retain and dup cleared
    pub fn simple(qos: u8, payload: Vec<u8>) -> Self {
        Self::new(qos, false, false, payload)
    }
}

/// Caller-supplied handler invoked for each message delivered on a
/// subscribed topic.
///
/// Any per-subscription context lives in the closure's captures; the
/// lifecycle layer only clones and invokes the handler, it never owns the
/// context separately.
pub type MessageHandler = Arc<dyn Fn(&str, &TopicMessage) + Send + Sync>;

/// The wire-level MQTT engine, consumed as an external collaborator.
///
/// Implementations own connect/keep-alive/framing entirely. None of these
/// verbs are retried by the lifecycle layer; an error is passed straight
/// back to the caller.
pub trait ProtocolEngine: Send + Sync {
    /// Perform the network handshake for an engine built from params
    fn connect(&self) -> LinkResult<()>;

    /// Release the connection and all engine-owned resources
    fn release(&self);

    /// Register a live subscription
    fn subscribe(&self, topic_filter: &str, qos: u8, handler: MessageHandler) -> LinkResult<()>;

    /// Register a live subscription and block until acknowledged or
    /// `timeout_ms` elapses
    fn subscribe_sync(
        &self,
        topic_filter: &str,
        qos: u8,
        handler: MessageHandler,
        timeout_ms: u64,
    ) -> LinkResult<()>;

    /// Remove a live subscription
    fn unsubscribe(&self, topic_filter: &str) -> LinkResult<()>;

    /// Publish a message, returning the number of payload bytes sent
    fn publish(&self, topic: &str, message: &TopicMessage) -> LinkResult<usize>;

    /// Give the engine's I/O loop up to `timeout_ms` of the calling thread
    fn yield_once(&self, timeout_ms: u64) -> LinkResult<()>;

    /// Whether the connection is currently in a normal state
    fn check_state(&self) -> bool;
}

/// Builds engine clients from validated connection parameters
pub trait EngineFactory: Send + Sync {
    fn init(&self, params: &ConnectParams) -> LinkResult<Arc<dyn ProtocolEngine>>;
}

/// Cloneable handle to one live engine client.
///
/// Handles are only ever produced by a successful construct; holding one
/// implies the connect handshake completed.
#[derive(Clone)]
pub struct ClientHandle {
    engine: Arc<dyn ProtocolEngine>,
}

impl ClientHandle {
    pub(crate) fn new(engine: Arc<dyn ProtocolEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &dyn ProtocolEngine {
        self.engine.as_ref()
    }

    /// True if both handles refer to the same engine client
    pub fn same_client(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("engine", &Arc::as_ptr(&self.engine))
            .finish()
    }
}
