//! One-shot device-info and firmware-version report.
//!
//! Fired once after a successful connect, before the client is published
//! as the default handle. Strictly best-effort: a failed publish is logged
//! at debug level and never surfaces to the construct caller.

use serde_json::json;

use super::engine::{ProtocolEngine, TopicMessage, QOS_AT_MOST_ONCE};
use crate::dev_sign::DeviceMeta;

/// SDK version attribute reported to the cloud
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn device_info_topic(product_key: &str, device_name: &str) -> String {
    format!("/sys/{}/{}/thing/deviceinfo/update", product_key, device_name)
}

pub(crate) fn device_info_payload() -> String {
    json!({
        "id": "11111111112",
        "version": "1.0",
        "params": [
            {
                "attrKey": "SYS_LP_SDK_VERSION",
                "attrValue": SDK_VERSION,
                "domain": "SYSTEM",
            }
        ],
        "method": "thing.deviceinfo.update",
    })
    .to_string()
}

pub(crate) fn firmware_topic(product_key: &str, device_name: &str) -> String {
    format!("/ota/device/inform/{}/{}", product_key, device_name)
}

pub(crate) fn firmware_payload(version: &str) -> String {
    json!({
        "id": "1",
        "params": { "version": version },
    })
    .to_string()
}

/// Publish the device-info attributes and, when configured, the firmware
/// version, swallowing any engine failure.
pub(crate) fn report_device_info(
    engine: &dyn ProtocolEngine,
    meta: &DeviceMeta,
    firmware_version: Option<&str>,
) {
    let topic = device_info_topic(&meta.product_key, &meta.device_name);
    let message = TopicMessage::simple(QOS_AT_MOST_ONCE, device_info_payload().into_bytes());
    if let Err(err) = engine.publish(&topic, &message) {
        tracing::debug!(topic = %topic, error = %err, "device info report skipped");
    }

    if let Some(version) = firmware_version {
        let topic = firmware_topic(&meta.product_key, &meta.device_name);
        let message = TopicMessage::simple(QOS_AT_MOST_ONCE, firmware_payload(version).into_bytes());
        if let Err(err) = engine.publish(&topic, &message) {
            tracing::debug!(topic = %topic, error = %err, "firmware version report skipped");
        }
    }
}
