// SPDX-License-Identifier: Apache-2.0

//! Resource naming for the channel.
//!
//! A channel's identity on the host is carried entirely by two strings
//! mapped into global OS namespaces: one POSIX shared memory object and
//! one POSIX named semaphore. Name derivation lives here as pure
//! functions so producers and consumers can never disagree on it.

use std::fmt;

use crate::error::ChannelError;

/// Prefix for shared segment names (the data slot).
pub const SEGMENT_PREFIX: &str = "slot_seg_";

/// Prefix for signal names (the "new data" notification).
pub const SIGNAL_PREFIX: &str = "slot_sig_";

/// Maximum length of a channel name in characters.
///
/// Keeps derived names well inside the 255-byte limit POSIX imposes on
/// shm and semaphore names.
pub const MAX_NAME_LEN: usize = 128;

/// Validated channel name.
/// Must be non-empty, alphanumeric with hyphens/underscores, max 128 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    /// Create a new ChannelName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ChannelError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ChannelError::InvalidConfig {
                field: "channel_name",
                reason: "Name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ChannelError::InvalidConfig {
                field: "channel_name",
                reason: format!("Name too long: {} chars (max {})", name.len(), MAX_NAME_LEN),
            });
        }

        // Validate characters: alphanumeric, hyphens, underscores
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ChannelError::InvalidConfig {
                field: "channel_name",
                reason: "Name must contain only ASCII alphanumeric characters, hyphens, and underscores"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the global shared segment name for a channel.
///
/// The leading slash places the object in the host-global POSIX shm
/// namespace, so any process on the machine can open it by name.
pub fn segment_name(channel: &ChannelName) -> String {
    format!("/{}{}", SEGMENT_PREFIX, channel.as_str())
}

/// Derive the global signal name for a channel. Paired 1:1 with the
/// segment of the same channel.
pub fn signal_name(channel: &ChannelName) -> String {
    format!("/{}{}", SIGNAL_PREFIX, channel.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names_are_global() {
        let name = ChannelName::new("telemetry").unwrap();
        assert!(segment_name(&name).starts_with('/'));
        assert!(signal_name(&name).starts_with('/'));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = ChannelName::new("ctrl-state").unwrap();
        let b = ChannelName::new("ctrl-state").unwrap();
        assert_eq!(segment_name(&a), segment_name(&b));
        assert_eq!(segment_name(&a), "/slot_seg_ctrl-state");
        assert_eq!(signal_name(&a), "/slot_sig_ctrl-state");
    }

    #[test]
    fn test_segment_and_signal_names_differ() {
        let name = ChannelName::new("same_channel").unwrap();
        assert_ne!(segment_name(&name), signal_name(&name));
    }

    #[test]
    fn test_name_validation() {
        assert!(ChannelName::new("valid_name-01").is_ok());
        assert!(ChannelName::new("").is_err());
        assert!(ChannelName::new("has space").is_err());
        assert!(ChannelName::new("has/slash").is_err());
        assert!(ChannelName::new("a".repeat(MAX_NAME_LEN)).is_ok());
        assert!(ChannelName::new("a".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
