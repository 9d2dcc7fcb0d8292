// SPDX-License-Identifier: MPL-2.0

//! Client lifecycle coordination.
//!
//! [`MqttLifecycle`] is the public contract of this crate: it constructs
//! and destroys engine clients, tracks the single default handle, routes
//! subscribe calls to the offline queue when no client is live, and
//! replays that queue on connect.
//!
//! # Construct sequence
//!
//! 1. Resolve parameters (caller-supplied, or derived via the signer).
//! 2. Validate them.
//! 3. Build the engine client from the factory.
//! 4. Run the connect handshake; on failure release the engine and abort
//!    with no visible side effect.
//! 5. Only on success: drain the offline queue, fire the best-effort
//!    device report, publish the handle as the default client, invoke the
//!    connect observer.
//!
//! Every failure exit leaves the offline queue intact and the default
//! handle unset; a partially initialized client is never observable.

use std::sync::Mutex;

use super::engine::{clamp_qos, ClientHandle, EngineFactory, MessageHandler, TopicMessage};
use super::error::{LinkError, LinkResult};
use super::offline::OfflineQueue;
use super::opts::ConnectParams;
use super::report;
use crate::dev_sign::{CloudRegion, CredentialSigner, DeviceMeta, HmacSha256Signer};

/// Upper bound applied to the synchronous-subscribe timeout
pub const SUBSCRIBE_SYNC_TIMEOUT_MAX_MS: u64 = 10_000;

/// Hook invoked once, synchronously, right after the default client is
/// published on a successful construct
pub type ConnectObserver = Box<dyn Fn(&ClientHandle) + Send + Sync>;

/// Lifecycle and dispatch coordinator for one logical device client
pub struct MqttLifecycle {
    meta: DeviceMeta,
    region: CloudRegion,
    factory: Box<dyn EngineFactory>,
    signer: Box<dyn CredentialSigner>,
    firmware_version: Option<String>,
    on_connected: Option<ConnectObserver>,
    offline: OfflineQueue,
    default_client: Mutex<Option<ClientHandle>>,
}

impl MqttLifecycle {
    /// Create a coordinator with the default region (Shanghai) and the
    /// standard HMAC-SHA256 signer
    pub fn new(meta: DeviceMeta, factory: Box<dyn EngineFactory>) -> Self {
        Self {
            meta,
            region: CloudRegion::Shanghai,
            factory,
            signer: Box::new(HmacSha256Signer::new()),
            firmware_version: None,
            on_connected: None,
            offline: OfflineQueue::new(),
            default_client: Mutex::new(None),
        }
    }

    pub fn with_region(mut self, region: CloudRegion) -> Self {
        self.region = region;
        self
    }

    pub fn with_signer(mut self, signer: Box<dyn CredentialSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Firmware version for the post-connect OTA inform report
    pub fn with_firmware_version(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = Some(version.into());
        self
    }

    pub fn with_connect_observer(mut self, observer: ConnectObserver) -> Self {
        self.on_connected = Some(observer);
        self
    }

    pub fn with_offline_capacity(mut self, capacity: usize) -> Self {
        self.offline = OfflineQueue::with_capacity(capacity);
        self
    }

    // --- Lifecycle ---

    /// Build, connect and publish a client.
    ///
    /// With `params == None` the parameters are derived from device
    /// identity via the signer, and the call is rejected with
    /// `PreconditionFailed` while a default client already exists.
    /// Explicit parameters bypass that guard (callers may hold any number
    /// of independently constructed handles); the newest successful
    /// construct always becomes the default client.
    pub fn construct(&self, params: Option<ConnectParams>) -> LinkResult<ClientHandle> {
        let params = match params {
            Some(params) => params,
            None => {
                if self.default_client().is_some() {
                    return Err(LinkError::PreconditionFailed {
                        operation: "construct".to_string(),
                    });
                }
                self.signer.sign(&self.meta, &self.region)?
            }
        };

        params.validate()?;

        let engine = self.factory.init(&params)?;

        if let Err(err) = engine.connect() {
            engine.release();
            return Err(match err {
                err @ LinkError::ConnectFailed { .. } => err,
                other => LinkError::ConnectFailed {
                    reason: other.to_string(),
                },
            });
        }

        let replayed = self.offline.drain(engine.as_ref());
        if replayed > 0 {
            tracing::debug!(replayed, "offline subscriptions replayed on connect");
        }

        report::report_device_info(
            engine.as_ref(),
            &self.meta,
            self.firmware_version.as_deref(),
        );

        let handle = ClientHandle::new(engine);
        *self.default_lock() = Some(handle.clone());

        if let Some(observer) = &self.on_connected {
            observer(&handle);
        }

        Ok(handle)
    }

    /// Release a client's connection and resources.
    ///
    /// With no explicit handle this targets the default client and fails
    /// with `PreconditionFailed` when none is published. The offline
    /// queue is deliberately left alone: entries parked before a failed
    /// construct stay replayable by a later one.
    pub fn destroy(&self, handle: Option<&ClientHandle>) -> LinkResult<()> {
        let target = match handle {
            Some(handle) => handle.clone(),
            None => self.default_client().ok_or_else(|| LinkError::PreconditionFailed {
                operation: "destroy".to_string(),
            })?,
        };

        target.engine().release();

        let mut slot = self.default_lock();
        if slot.as_ref().is_some_and(|current| current.same_client(&target)) {
            *slot = None;
        }
        Ok(())
    }

    /// Lend the calling thread to the engine's I/O loop for up to
    /// `timeout_ms`
    pub fn yield_once(&self, handle: Option<&ClientHandle>, timeout_ms: u64) -> LinkResult<()> {
        let client = self.resolve(handle, "yield")?;
        client.engine().yield_once(timeout_ms)
    }

    /// Whether the resolved client's connection is in a normal state
    pub fn check_state_normal(&self, handle: Option<&ClientHandle>) -> LinkResult<bool> {
        let client = self.resolve(handle, "check_state")?;
        Ok(client.engine().check_state())
    }

    // --- Dispatch ---

    /// Register a subscription.
    ///
    /// When neither an explicit handle nor a default client resolves, the
    /// entry is parked on the offline queue; this is the only dispatch
    /// path that succeeds without a live connection. Out-of-range QoS is
    /// clamped to QoS 0 with a warning.
    pub fn subscribe(
        &self,
        handle: Option<&ClientHandle>,
        topic_filter: &str,
        qos: u8,
        handler: MessageHandler,
    ) -> LinkResult<()> {
        let Some(client) = self.resolve_opt(handle) else {
            return self.offline.append(topic_filter, qos, handler);
        };

        if topic_filter.is_empty() {
            return Err(LinkError::empty_field("topic_filter"));
        }
        client.engine().subscribe(topic_filter, clamp_qos(qos), handler)
    }

    /// Register a subscription and wait for its acknowledgement.
    ///
    /// The caller-supplied timeout is clamped to
    /// [`SUBSCRIBE_SYNC_TIMEOUT_MAX_MS`] to bound worst-case blocking.
    /// Offline behavior matches [`MqttLifecycle::subscribe`]: without a
    /// live client the entry is parked and the timeout is irrelevant.
    pub fn subscribe_sync(
        &self,
        handle: Option<&ClientHandle>,
        topic_filter: &str,
        qos: u8,
        handler: MessageHandler,
        timeout_ms: u64,
    ) -> LinkResult<()> {
        let Some(client) = self.resolve_opt(handle) else {
            return self.offline.append(topic_filter, qos, handler);
        };

        if topic_filter.is_empty() {
            return Err(LinkError::empty_field("topic_filter"));
        }
        let timeout_ms = timeout_ms.min(SUBSCRIBE_SYNC_TIMEOUT_MAX_MS);
        client
            .engine()
            .subscribe_sync(topic_filter, clamp_qos(qos), handler, timeout_ms)
    }

    /// Remove a live subscription.
    ///
    /// There is no offline equivalent: without a live client this is an
    /// error, not a deferred operation.
    pub fn unsubscribe(&self, handle: Option<&ClientHandle>, topic_filter: &str) -> LinkResult<()> {
        let client = self.resolve(handle, "unsubscribe")?;
        if topic_filter.is_empty() {
            return Err(LinkError::empty_field("topic_filter"));
        }
        client.engine().unsubscribe(topic_filter)
    }

    /// Publish a message, returning the number of payload bytes sent.
    ///
    /// Like unsubscribe, publish has no offline path.
    pub fn publish(
        &self,
        handle: Option<&ClientHandle>,
        topic: &str,
        message: &TopicMessage,
    ) -> LinkResult<usize> {
        let client = self.resolve(handle, "publish")?;
        if topic.is_empty() {
            return Err(LinkError::empty_field("topic"));
        }
        client.engine().publish(topic, message)
    }

    /// Publish raw bytes at the given QoS, retain and dup cleared
    pub fn publish_simple(
        &self,
        handle: Option<&ClientHandle>,
        topic: &str,
        qos: u8,
        payload: Vec<u8>,
    ) -> LinkResult<usize> {
        self.publish(handle, topic, &TopicMessage::simple(qos, payload))
    }

    // --- Introspection ---

    /// The currently published default client, if any
    pub fn default_client(&self) -> Option<ClientHandle> {
        self.default_lock().clone()
    }

    /// Number of subscriptions currently parked offline
    pub fn offline_len(&self) -> usize {
        self.offline.len()
    }

    // --- Internal helpers ---

    fn resolve_opt(&self, handle: Option<&ClientHandle>) -> Option<ClientHandle> {
        handle.cloned().or_else(|| self.default_client())
    }

    fn resolve(&self, handle: Option<&ClientHandle>, operation: &str) -> LinkResult<ClientHandle> {
        self.resolve_opt(handle)
            .ok_or_else(|| LinkError::PreconditionFailed {
                operation: operation.to_string(),
            })
    }

    fn default_lock(&self) -> std::sync::MutexGuard<'_, Option<ClientHandle>> {
        self.default_client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
