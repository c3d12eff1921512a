//! Custom error types for shmslot.
//!
//! All errors are explicit enum variants - no `Box<dyn Error>`, no
//! `anyhow::Result`. The variants mirror the channel's failure taxonomy:
//! configuration errors are synchronous and never retried, `NotFound` is
//! the one transient condition (absorbed by the connect retry loop), and
//! everything else propagates unmodified.

use thiserror::Error;

/// Top-level error type for the single-slot channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    // =========================================================================
    // Configuration Errors - Fail-Fast, Before Any OS Resource Is Touched
    // =========================================================================
    #[error("Invalid channel configuration: {field} - {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    // =========================================================================
    // Provisioning Errors - Fatal To The Call, Never Retried
    // =========================================================================
    #[error("Resource name already in use: {name}")]
    Conflict { name: String },

    #[error("Failed to create shared resource: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Failed to map shared segment: {name} - {reason}")]
    MapFailed { name: String, reason: String },

    // =========================================================================
    // Attachment Errors - NotFound Is Transient, Everything Else Is Fatal
    // =========================================================================
    #[error("Peer resource not found: {name}")]
    NotFound { name: String },

    #[error("Failed to attach to peer resource: {name} - {reason}")]
    AttachFailed { name: String, reason: String },

    // =========================================================================
    // Data Path Errors
    // =========================================================================
    #[error("Signal operation '{op}' failed: {reason}")]
    SignalFailed { op: &'static str, reason: String },

    #[error("Outbound resources are not provisioned")]
    NotProvisioned,

    #[error("Channel is not connected - call try_connect first")]
    NotConnected,

    #[error("Timed out waiting for an inbound signal")]
    ReceiveTimeout,
}

impl ChannelError {
    /// Whether this error is the transient "peer not created yet" condition
    /// that the connect loop retries. All other errors abort the loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::NotFound { .. })
    }
}

/// Result type alias using ChannelError.
pub type ChannelResult<T> = Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChannelError::InvalidConfig {
            field: "channel_name",
            reason: "Name cannot be empty".to_string(),
        };
        assert!(err.to_string().contains("channel_name"));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_transient_classification() {
        let not_found = ChannelError::NotFound {
            name: "/slot_seg_peer".to_string(),
        };
        assert!(not_found.is_transient());

        let conflict = ChannelError::Conflict {
            name: "/slot_seg_peer".to_string(),
        };
        assert!(!conflict.is_transient());
        assert!(!ChannelError::ReceiveTimeout.is_transient());
    }
}
