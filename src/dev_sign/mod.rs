// SPDX-License-Identifier: MPL-2.0

//! Credential signing collaborator.
//!
//! Turns device identity (product key, device name, device secret) plus a
//! target region into the connection parameters the engine needs. The
//! default signer implements the cloud's HMAC-SHA256 scheme; alternative
//! backends plug in via [`CredentialSigner`].

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::mqtt_api::error::{LinkError, LinkResult};
use crate::mqtt_api::opts::ConnectParams;

/// Default (non-TLS) broker port produced by the signer
pub const DEFAULT_SIGN_PORT: u16 = 1883;

/// Device identity triple
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct DeviceMeta {
    pub product_key: String,
    pub device_name: String,
    pub device_secret: String,
}

impl DeviceMeta {
    pub fn new(
        product_key: impl Into<String>,
        device_name: impl Into<String>,
        device_secret: impl Into<String>,
    ) -> Self {
        Self {
            product_key: product_key.into(),
            device_name: device_name.into(),
            device_secret: device_secret.into(),
        }
    }

    /// The `{product_key}.{device_name}` identifier used in client ids and
    /// signature sources
    pub fn device_id(&self) -> String {
        format!("{}.{}", self.product_key, self.device_name)
    }

    fn validate(&self) -> LinkResult<()> {
        for (name, value) in [
            ("product_key", &self.product_key),
            ("device_name", &self.device_name),
            ("device_secret", &self.device_secret),
        ] {
            if value.is_empty() {
                return Err(LinkError::SigningFailed {
                    reason: format!("{} is empty", name),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DeviceMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the device secret
        f.debug_struct("DeviceMeta")
            .field("product_key", &self.product_key)
            .field("device_name", &self.device_name)
            .field("device_secret", &"<redacted>")
            .finish()
    }
}

/// Target cloud region for the derived broker host
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CloudRegion {
    Shanghai,
    Singapore,
    Japan,
    UsWest,
    UsEast,
    Germany,
    /// Literal broker host, bypassing the regional domain scheme
    Custom(String),
}

impl CloudRegion {
    fn region_id(&self) -> Option<&str> {
        match self {
            Self::Shanghai => Some("cn-shanghai"),
            Self::Singapore => Some("ap-southeast-1"),
            Self::Japan => Some("ap-northeast-1"),
            Self::UsWest => Some("us-west-1"),
            Self::UsEast => Some("us-east-1"),
            Self::Germany => Some("eu-central-1"),
            Self::Custom(_) => None,
        }
    }

    /// Broker hostname for a device in this region
    pub fn broker_host(&self, product_key: &str) -> String {
        match self {
            Self::Custom(host) => host.clone(),
            other => format!(
                "{}.iot-as-mqtt.{}.aliyuncs.com",
                product_key,
                other.region_id().unwrap_or("cn-shanghai")
            ),
        }
    }
}

/// Derives connection parameters from device identity
pub trait CredentialSigner: Send + Sync {
    fn sign(&self, meta: &DeviceMeta, region: &CloudRegion) -> LinkResult<ConnectParams>;
}

/// The standard HMAC-SHA256 signing scheme.
///
/// - username: `{device_name}&{product_key}`
/// - password: lowercase hex of HMAC-SHA256 over
///   `clientId{device_id}deviceName{dn}productKey{pk}`, keyed by the
///   device secret
/// - client id: `{device_id}|securemode=3,signmethod=hmacsha256|`
#[derive(Debug, Default)]
pub struct HmacSha256Signer;

impl HmacSha256Signer {
    pub fn new() -> Self {
        Self
    }

    fn password(&self, meta: &DeviceMeta) -> LinkResult<String> {
        let plain = format!(
            "clientId{}deviceName{}productKey{}",
            meta.device_id(),
            meta.device_name,
            meta.product_key
        );
        let mut mac = Hmac::<Sha256>::new_from_slice(meta.device_secret.as_bytes())
            .map_err(|err| LinkError::SigningFailed {
                reason: format!("hmac key setup: {}", err),
            })?;
        mac.update(plain.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl CredentialSigner for HmacSha256Signer {
    fn sign(&self, meta: &DeviceMeta, region: &CloudRegion) -> LinkResult<ConnectParams> {
        meta.validate()?;

        let password = self.password(meta)?;
        ConnectParams::builder()
            .host(region.broker_host(&meta.product_key))
            .port(DEFAULT_SIGN_PORT)
            .client_id(format!(
                "{}|securemode=3,signmethod=hmacsha256|",
                meta.device_id()
            ))
            .username(format!("{}&{}", meta.device_name, meta.product_key))
            .password(password)
            .build()
    }
}
