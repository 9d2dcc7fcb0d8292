// SPDX-License-Identifier: MPL-2.0

//! Error types for the MQTT lifecycle layer
//!
//! Every fallible operation in this crate reports a discriminated
//! `LinkError`; nothing here panics on a caller mistake. The variants are
//! grouped by who is at fault: the caller, a local resource bound, the
//! credential signer, or the protocol engine.

use std::fmt;

/// Error type for lifecycle, queueing and dispatch operations
#[derive(Debug, Clone, serde::Serialize)]
pub enum LinkError {
    // ==================== Caller Errors ====================
    /// A required argument was missing or empty
    InvalidArgument { field: String, reason: String },

    /// No client handle could be resolved for the call
    ///
    /// Raised when an operation needs a live client, the caller supplied
    /// no explicit handle, and no default client has been published.
    PreconditionFailed { operation: String },

    // ==================== Resource Errors ====================
    /// A bounded in-memory structure is at capacity
    ResourceExhausted {
        resource: String,
        capacity: usize,
    },

    // ==================== Collaborator Errors ====================
    /// Credential derivation from device identity failed
    SigningFailed { reason: String },

    /// The engine's network handshake failed
    ConnectFailed { reason: String },

    /// Pass-through failure from a live engine operation
    EngineError {
        operation: String,
        reason: String,
    },
}

impl LinkError {
    /// Returns true if retrying the same call later may succeed
    ///
    /// Connect and engine failures are transient from this layer's point
    /// of view; the retry policy itself belongs to the caller or the
    /// engine, never to this crate.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::EngineError { .. }
                | Self::ResourceExhausted { .. }
        )
    }

    /// Returns true if the error indicates a caller bug rather than an
    /// environmental condition
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::PreconditionFailed { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArgument { field, reason } => {
                format!("Invalid argument '{}': {}", field, reason)
            }
            Self::PreconditionFailed { operation } => {
                format!(
                    "No client handle resolvable for '{}'. Construct a client first.",
                    operation
                )
            }
            Self::ResourceExhausted { resource, capacity } => {
                format!("{} full (capacity: {}). Try again later.", resource, capacity)
            }
            Self::SigningFailed { reason } => {
                format!("Credential signing failed: {}", reason)
            }
            Self::ConnectFailed { reason } => {
                format!("Connect handshake failed: {}", reason)
            }
            Self::EngineError { operation, reason } => {
                format!("Engine {} failed: {}", operation, reason)
            }
        }
    }

    /// Shorthand for the empty-field case of `InvalidArgument`
    pub fn empty_field(field: &str) -> Self {
        Self::InvalidArgument {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for LinkError {}

/// Type alias for Result with LinkError
pub type LinkResult<T> = Result<T, LinkError>;
