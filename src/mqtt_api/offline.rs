// SPDX-License-Identifier: MPL-2.0

//! Offline-subscription queue.
//!
//! Subscriptions registered before any client exists are parked here and
//! replayed, in registration order, the moment a connect succeeds. The
//! backing storage is created lazily on the first offline registration and
//! torn back down to "not yet created" after a drain, so the queue costs
//! nothing for callers that only subscribe while connected.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use super::engine::{clamp_qos, MessageHandler, ProtocolEngine};
use super::error::{LinkError, LinkResult};

/// Default bound on parked subscriptions
pub const DEFAULT_OFFLINE_CAPACITY: usize = 1000;

/// One subscription registered while no client was live
pub struct DeferredSubscription {
    pub topic_filter: String,
    pub qos: u8,
    pub handler: MessageHandler,
}

impl fmt::Debug for DeferredSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredSubscription")
            .field("topic_filter", &self.topic_filter)
            .field("qos", &self.qos)
            .finish()
    }
}

/// Ordered, mutex-guarded collection of deferred subscriptions.
///
/// Entry lifecycle: each appended entry is handed to the engine exactly
/// once during [`OfflineQueue::drain`], or dropped with the queue; an
/// entry is never replayed twice. Drain and append serialize on the same
/// lock, but drain swaps the whole deque out under the lock and replays
/// after releasing it, so live-subscribe calls never run with the lock
/// held. An append racing a drain lands in a freshly created queue and
/// waits for the next drain.
pub struct OfflineQueue {
    entries: Mutex<Option<VecDeque<DeferredSubscription>>>,
    capacity: usize,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_OFFLINE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(None),
            capacity,
        }
    }

    /// Park a subscription until a connect succeeds.
    ///
    /// Creates the backing storage on first use. Reports
    /// `ResourceExhausted` when the queue is at capacity, without touching
    /// the queued entries.
    pub fn append(
        &self,
        topic_filter: &str,
        qos: u8,
        handler: MessageHandler,
    ) -> LinkResult<()> {
        if topic_filter.is_empty() {
            return Err(LinkError::empty_field("topic_filter"));
        }

        let mut guard = self.lock();
        let entries = guard.get_or_insert_with(VecDeque::new);
        if entries.len() >= self.capacity {
            return Err(LinkError::ResourceExhausted {
                resource: "offline subscription queue".to_string(),
                capacity: self.capacity,
            });
        }
        entries.push_back(DeferredSubscription {
            topic_filter: topic_filter.to_string(),
            qos,
            handler,
        });
        Ok(())
    }

    /// Replay every parked subscription against a now-live engine, in
    /// registration order, then tear the storage down.
    ///
    /// A failed live subscribe is logged and does not stop the walk; the
    /// entry is still consumed. Idempotent: with nothing queued this is a
    /// no-op, so it is safe to call on every connect. Returns the number
    /// of entries handed to the engine.
    pub fn drain(&self, engine: &dyn ProtocolEngine) -> usize {
        let taken = self.lock().take();
        let Some(entries) = taken else {
            return 0;
        };

        let mut replayed = 0;
        for entry in entries {
            let qos = clamp_qos(entry.qos);
            if let Err(err) = engine.subscribe(&entry.topic_filter, qos, entry.handler) {
                tracing::warn!(
                    topic_filter = %entry.topic_filter,
                    error = %err,
                    "offline subscription replay failed"
                );
            }
            replayed += 1;
        }
        replayed
    }

    /// Number of currently parked subscriptions
    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<VecDeque<DeferredSubscription>>> {
        // A poisoned lock only means another thread panicked mid-append;
        // the deque itself is still structurally sound.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_api::engine::TopicMessage;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Engine double that records subscribe calls
    struct RecordingEngine {
        subscribed: Mutex<Vec<(String, u8)>>,
        fail_filters: Vec<String>,
    }

    impl RecordingEngine {
        fn new() -> Self {
            Self {
                subscribed: Mutex::new(Vec::new()),
                fail_filters: Vec::new(),
            }
        }

        fn failing_on(filter: &str) -> Self {
            Self {
                subscribed: Mutex::new(Vec::new()),
                fail_filters: vec![filter.to_string()],
            }
        }

        fn calls(&self) -> Vec<(String, u8)> {
            self.subscribed.lock().unwrap().clone()
        }
    }

    impl ProtocolEngine for RecordingEngine {
        fn connect(&self) -> LinkResult<()> {
            Ok(())
        }

        fn release(&self) {}

        fn subscribe(
            &self,
            topic_filter: &str,
            qos: u8,
            _handler: MessageHandler,
        ) -> LinkResult<()> {
            self.subscribed
                .lock()
                .unwrap()
                .push((topic_filter.to_string(), qos));
            if self.fail_filters.iter().any(|f| f == topic_filter) {
                return Err(LinkError::EngineError {
                    operation: "subscribe".into(),
                    reason: "injected".into(),
                });
            }
            Ok(())
        }

        fn subscribe_sync(
            &self,
            topic_filter: &str,
            qos: u8,
            handler: MessageHandler,
            _timeout_ms: u64,
        ) -> LinkResult<()> {
            self.subscribe(topic_filter, qos, handler)
        }

        fn unsubscribe(&self, _topic_filter: &str) -> LinkResult<()> {
            Ok(())
        }

        fn publish(&self, _topic: &str, message: &TopicMessage) -> LinkResult<usize> {
            Ok(message.payload.len())
        }

        fn yield_once(&self, _timeout_ms: u64) -> LinkResult<()> {
            Ok(())
        }

        fn check_state(&self) -> bool {
            true
        }
    }

    fn noop_handler() -> MessageHandler {
        Arc::new(|_topic: &str, _msg: &TopicMessage| {})
    }

    #[test]
    fn test_append_rejects_empty_filter() {
        let queue = OfflineQueue::new();
        let err = queue.append("", 0, noop_handler()).unwrap_err();
        match err {
            LinkError::InvalidArgument { field, .. } => assert_eq!(field, "topic_filter"),
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_append_is_fifo_and_lazy() {
        let queue = OfflineQueue::new();
        assert!(queue.is_empty());

        queue.append("a/b", 0, noop_handler()).unwrap();
        queue.append("c/d", 1, noop_handler()).unwrap();
        assert_eq!(queue.len(), 2);

        let engine = RecordingEngine::new();
        let replayed = queue.drain(&engine);
        assert_eq!(replayed, 2);
        assert_eq!(
            engine.calls(),
            vec![("a/b".to_string(), 0), ("c/d".to_string(), 1)]
        );
    }

    #[test]
    fn test_capacity_overflow_reports_resource_exhausted() {
        let queue = OfflineQueue::with_capacity(2);
        queue.append("t/1", 0, noop_handler()).unwrap();
        queue.append("t/2", 0, noop_handler()).unwrap();

        let err = queue.append("t/3", 0, noop_handler()).unwrap_err();
        match err {
            LinkError::ResourceExhausted { capacity, .. } => assert_eq!(capacity, 2),
            other => panic!("Expected ResourceExhausted, got {:?}", other),
        }
        // The failed append must not have partially mutated the queue
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_drain_is_idempotent() {
        let queue = OfflineQueue::new();
        queue.append("x/y", 2, noop_handler()).unwrap();

        let engine = RecordingEngine::new();
        assert_eq!(queue.drain(&engine), 1);
        assert_eq!(queue.drain(&engine), 0);
        assert_eq!(engine.calls().len(), 1);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_drain_survives_entry_failure() {
        let queue = OfflineQueue::new();
        queue.append("bad/topic", 0, noop_handler()).unwrap();
        queue.append("good/topic", 1, noop_handler()).unwrap();

        let engine = RecordingEngine::failing_on("bad/topic");
        let replayed = queue.drain(&engine);

        // The failing entry is consumed and the rest still replays
        assert_eq!(replayed, 2);
        assert_eq!(
            engine.calls(),
            vec![("bad/topic".to_string(), 0), ("good/topic".to_string(), 1)]
        );
    }

    #[test]
    fn test_drain_clamps_out_of_range_qos() {
        let queue = OfflineQueue::new();
        queue.append("q/clamp", 9, noop_handler()).unwrap();

        let engine = RecordingEngine::new();
        queue.drain(&engine);
        assert_eq!(engine.calls(), vec![("q/clamp".to_string(), 0)]);
    }

    #[test]
    fn test_queue_rebuilds_after_drain() {
        let queue = OfflineQueue::new();
        queue.append("first/run", 0, noop_handler()).unwrap();

        let engine = RecordingEngine::new();
        queue.drain(&engine);

        // Storage was torn down; a later offline append starts fresh
        queue.append("second/run", 1, noop_handler()).unwrap();
        assert_eq!(queue.len(), 1);
        let engine2 = RecordingEngine::new();
        assert_eq!(queue.drain(&engine2), 1);
        assert_eq!(engine2.calls(), vec![("second/run".to_string(), 1)]);
    }

    #[test]
    fn test_handler_survives_round_trip() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let handler: MessageHandler = Arc::new(move |_topic, _msg| {
            fired_clone.store(true, Ordering::SeqCst);
        });

        let queue = OfflineQueue::new();
        queue.append("h/t", 1, handler).unwrap();

        struct InvokingEngine;
        impl ProtocolEngine for InvokingEngine {
            fn connect(&self) -> LinkResult<()> {
                Ok(())
            }
            fn release(&self) {}
            fn subscribe(
                &self,
                topic_filter: &str,
                _qos: u8,
                handler: MessageHandler,
            ) -> LinkResult<()> {
                (*handler)(topic_filter, &TopicMessage::simple(0, Vec::new()));
                Ok(())
            }
            fn subscribe_sync(
                &self,
                topic_filter: &str,
                qos: u8,
                handler: MessageHandler,
                _timeout_ms: u64,
            ) -> LinkResult<()> {
                self.subscribe(topic_filter, qos, handler)
            }
            fn unsubscribe(&self, _topic_filter: &str) -> LinkResult<()> {
                Ok(())
            }
            fn publish(&self, _topic: &str, _message: &TopicMessage) -> LinkResult<usize> {
                Ok(0)
            }
            fn yield_once(&self, _timeout_ms: u64) -> LinkResult<()> {
                Ok(())
            }
            fn check_state(&self) -> bool {
                true
            }
        }

        queue.drain(&InvokingEngine);
        assert!(fired.load(Ordering::SeqCst));
    }
}
