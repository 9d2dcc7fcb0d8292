// SPDX-License-Identifier: MPL-2.0

//! Device-side MQTT lifecycle and session-continuity layer.
//!
//! This crate sits between application code and a wire-level MQTT engine.
//! Its one distinctive capability: subscriptions registered *before* a
//! connection exists are parked in an in-memory queue and replayed, in
//! registration order, the moment a connect succeeds — so startup code
//! can declare its topic interests without caring whether the network is
//! up yet.
//!
//! The main entry point is [`mqtt_api::MqttLifecycle`], which constructs
//! clients (deriving credentials via [`dev_sign`] when none are given),
//! tracks the default client handle, and routes subscribe / unsubscribe /
//! publish calls. The wire protocol itself is an external collaborator
//! behind [`mqtt_api::ProtocolEngine`].

pub mod dev_sign;
pub mod mqtt_api;

pub use dev_sign::{CloudRegion, CredentialSigner, DeviceMeta, HmacSha256Signer};
pub use mqtt_api::{
    ClientHandle, ConnectParams, EngineFactory, LinkError, LinkResult, MessageHandler,
    MqttLifecycle, ProtocolEngine, TopicMessage,
};
