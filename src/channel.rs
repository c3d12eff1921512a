// SPDX-License-Identifier: Apache-2.0

//! SharedSlotChannel - the point-to-point single-slot channel.
//!
//! Each channel owns one outbound segment/signal pair created from its
//! own name at construction, and attaches to a peer's pair by name via
//! `try_connect`. The slot holds at most one unread value: a send
//! overwrites whatever is there and sets the signal, a receive waits for
//! the signal and copies the slot out. No queueing, no backpressure, no
//! peer-liveness detection.
//!
//! The slot is not guarded by a lock. For payloads wider than the
//! platform word a read racing a write can observe a torn value; callers
//! needing atomicity must keep the payload within the word size or embed
//! their own sequence field and re-read until stable.

use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{ChannelConfig, ConnectConfig};
use crate::error::{ChannelError, ChannelResult};
use crate::name::{segment_name, signal_name, ChannelName};
use crate::payload::SlotPayload;
use crate::shm::{SharedSegment, SlotSignal};

/// One direction's resources, acquired and released as a unit.
struct SlotPair {
    segment: SharedSegment,
    signal: SlotSignal,
}

/// A point-to-point single-slot channel over named shared memory.
///
/// `T` is the fixed-size payload; the outbound segment is sized to
/// exactly `size_of::<T>()` with no header or framing. Two processes
/// form a duplex link by cross-wiring names: process A uses
/// `("a", "b")`, process B uses `("b", "a")`, and each calls
/// [`try_connect`](Self::try_connect) to attach to the other's slot.
pub struct SharedSlotChannel<T: SlotPayload> {
    outbound_name: ChannelName,
    inbound_name: ChannelName,
    config: ChannelConfig,
    outbound: Option<SlotPair>,
    inbound: Option<SlotPair>,
    connected: bool,
    _payload: PhantomData<T>,
}

impl<T: SlotPayload> SharedSlotChannel<T> {
    /// Create a channel and provision its outbound resources with the
    /// default configuration (signal initially unset, auto-reset).
    ///
    /// # Errors
    /// - `InvalidConfig` for a bad name or zero-sized payload, raised
    ///   before any OS resource is created.
    /// - `Conflict` if the outbound name is already in use.
    /// - `CreateFailed` / `MapFailed` on OS failure; nothing is leaked.
    pub fn new(outbound_name: &str, inbound_name: &str) -> ChannelResult<Self> {
        Self::with_config(outbound_name, inbound_name, ChannelConfig::default())
    }

    /// Create a channel with explicit configuration. Both peers must use
    /// the same signal configuration.
    pub fn with_config(
        outbound_name: &str,
        inbound_name: &str,
        config: ChannelConfig,
    ) -> ChannelResult<Self> {
        // All validation happens before any OS resource is touched.
        let outbound_name = ChannelName::new(outbound_name)?;
        let inbound_name = ChannelName::new(inbound_name)?;

        if mem::size_of::<T>() == 0 {
            return Err(ChannelError::InvalidConfig {
                field: "payload",
                reason: "Payload type must not be zero-sized".to_string(),
            });
        }

        let mut channel = Self {
            outbound_name,
            inbound_name,
            config,
            outbound: None,
            inbound: None,
            connected: false,
            _payload: PhantomData,
        };
        channel.provision_outbound()?;
        Ok(channel)
    }

    /// (Re)create the outbound segment and signal from the channel's own
    /// name.
    ///
    /// Destructive: a previously held pair is released (and its names
    /// unlinked) before the new one is created. An attached peer keeps
    /// its mapping of the old segment but will never see new data until
    /// it reconnects.
    pub fn provision_outbound(&mut self) -> ChannelResult<()> {
        // Drop the old pair first so its names are free for reuse.
        self.outbound = None;

        let seg_name = segment_name(&self.outbound_name);
        let sig_name = signal_name(&self.outbound_name);

        // Acquired as a unit: if the signal fails, the segment is
        // dropped (and unlinked) on the error path.
        let segment = SharedSegment::create(&seg_name, mem::size_of::<T>())?;
        let signal = SlotSignal::create(&sig_name, self.config.signal)?;

        tracing::debug!(
            channel = %self.outbound_name,
            size = mem::size_of::<T>(),
            "Provisioned outbound slot"
        );

        self.outbound = Some(SlotPair { segment, signal });
        Ok(())
    }

    /// Attach to the peer's segment and signal, retrying while they do
    /// not exist yet.
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` when the budget is
    /// exhausted without the peer appearing - a normal operational
    /// outcome, not an error. Any failure other than "not found yet"
    /// aborts the loop immediately and propagates.
    ///
    /// Already-connected channels return `Ok(true)` without re-attaching.
    pub fn try_connect(&mut self, config: ConnectConfig) -> ChannelResult<bool> {
        if self.connected {
            return Ok(true);
        }

        if config.retry_interval.is_zero() {
            return Err(ChannelError::InvalidConfig {
                field: "retry_interval",
                reason: "Retry interval must be non-zero".to_string(),
            });
        }

        let seg_name = segment_name(&self.inbound_name);
        let sig_name = signal_name(&self.inbound_name);
        let start = Instant::now();

        loop {
            match self.attach(&seg_name, &sig_name) {
                Ok(pair) => {
                    self.inbound = Some(pair);
                    self.connected = true;
                    tracing::info!(
                        channel = %self.inbound_name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Connected to peer slot"
                    );
                    return Ok(true);
                }
                Err(err) if err.is_transient() => {
                    if start.elapsed() >= config.timeout {
                        tracing::debug!(
                            channel = %self.inbound_name,
                            timeout_ms = config.timeout.as_millis() as u64,
                            "Connect budget exhausted"
                        );
                        return Ok(false);
                    }
                    thread::sleep(config.retry_interval);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Open the peer's segment and signal as a unit. If the segment
    /// opens but the signal does not exist yet, the segment is dropped
    /// and the whole attempt counts as not-found.
    fn attach(&self, seg_name: &str, sig_name: &str) -> ChannelResult<SlotPair> {
        let segment = SharedSegment::open(seg_name, mem::size_of::<T>())?;
        let signal = SlotSignal::open(sig_name, self.config.signal.reset_mode)?;
        Ok(SlotPair { segment, signal })
    }

    /// Whether a `try_connect` call has succeeded. Never reverts; loss
    /// of the peer is not detected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Write `value` into the outbound slot and set the signal.
    ///
    /// Overwrites any unread value - last write wins. Rapid successive
    /// sends collapse into a single pending notification; only the last
    /// value is observable. No acknowledgment from the receiver.
    pub fn send(&mut self, value: &T) -> ChannelResult<()> {
        let outbound = self.outbound.as_ref().ok_or(ChannelError::NotProvisioned)?;

        // SAFETY: the outbound segment is writable and exactly
        // size_of::<T>() bytes; T is plain data per SlotPayload.
        unsafe {
            ptr::copy_nonoverlapping(
                (value as *const T).cast::<u8>(),
                outbound.segment.as_ptr(),
                mem::size_of::<T>(),
            );
        }

        outbound.signal.notify()
    }

    /// Block until the peer signals new data, then copy the slot out.
    /// `Duration::MAX` waits without bound. Blocking parks the OS
    /// thread; there is no cancellation beyond the timeout itself.
    ///
    /// A timed-out wait returns `ReceiveTimeout` and does not read the
    /// slot - stale data is never silently returned.
    ///
    /// # Errors
    /// - `NotConnected` before a successful `try_connect`.
    /// - `ReceiveTimeout` when `timeout` elapses without a signal.
    pub fn receive(&self, timeout: Duration) -> ChannelResult<T> {
        let inbound = self.inbound.as_ref().ok_or(ChannelError::NotConnected)?;

        inbound.signal.wait(timeout)?;

        let mut value = MaybeUninit::<T>::uninit();
        // SAFETY: the inbound mapping is size_of::<T>() readable bytes;
        // SlotPayload guarantees T tolerates any bit pattern a torn
        // read of peer-written values can produce.
        unsafe {
            ptr::copy_nonoverlapping(
                inbound.segment.as_ptr().cast_const(),
                value.as_mut_ptr().cast::<u8>(),
                mem::size_of::<T>(),
            );
            Ok(value.assume_init())
        }
    }

    /// Clear a pending inbound notification. Only meaningful when the
    /// channel was configured with `ResetMode::Manual`.
    pub fn reset_inbound(&self) -> ChannelResult<()> {
        let inbound = self.inbound.as_ref().ok_or(ChannelError::NotConnected)?;
        inbound.signal.reset()
    }

    /// The channel's own (outbound) name.
    pub fn outbound_name(&self) -> &ChannelName {
        &self.outbound_name
    }

    /// The peer's (inbound) name.
    pub fn inbound_name(&self) -> &ChannelName {
        &self.inbound_name
    }
}
