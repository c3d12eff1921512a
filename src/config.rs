// SPDX-License-Identifier: Apache-2.0

//! Channel configuration.
//!
//! Plain validated structs with explicit defaults. Signal behavior and
//! connect retry policy are configuration supplied by the caller, never
//! hidden behavior derived from data. Both peers of a channel must use
//! the same `SignalConfig` for the signal they share.

use std::time::Duration;

/// Reset behavior of the channel signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Each satisfied wait consumes exactly one pending notification.
    Auto,
    /// The signal stays set across waits until explicitly reset.
    Manual,
}

/// Configuration for the channel's notification signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalConfig {
    /// Whether the signal starts in the set state.
    pub initially_set: bool,
    /// Auto- or manual-reset semantics.
    pub reset_mode: ResetMode,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            initially_set: false,
            reset_mode: ResetMode::Auto,
        }
    }
}

/// Retry policy for [`try_connect`](crate::SharedSlotChannel::try_connect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectConfig {
    /// Total budget for the attach loop. `Duration::MAX` means
    /// effectively unbounded.
    pub timeout: Duration,
    /// Sleep between attach attempts while the peer does not exist yet.
    pub retry_interval: Duration,
}

impl ConnectConfig {
    /// Default sleep between attach attempts: 100 ms.
    pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

    /// Bounded connect budget with the default retry interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            retry_interval: Self::DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::MAX,
            retry_interval: Self::DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Full channel configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Configuration applied to the outbound signal at provisioning time
    /// and assumed for the inbound signal when attaching.
    pub signal: SignalConfig,
}
