//! shmslot - single-slot shared-memory channel for point-to-point IPC.
//!
//! Two independent processes exchange fixed-size binary records through
//! a named POSIX shared memory segment, coordinated by a named semaphore
//! used as an event-style signal. The slot holds at most one unread
//! value: new writes overwrite unread ones (last write wins), and rapid
//! sends collapse into a single pending notification. Startup ordering
//! is unknown by design; the receiver attaches to the sender's resources
//! with a bounded retry loop.
//!
//! ```no_run
//! use std::time::Duration;
//! use shmslot::{ConnectConfig, SharedSlotChannel};
//!
//! // Process A: sends u64 snapshots on "a", receives on "b".
//! let mut a = SharedSlotChannel::<u64>::new("a", "b")?;
//! if a.try_connect(ConnectConfig::with_timeout(Duration::from_secs(5)))? {
//!     a.send(&1)?;
//!     let reply = a.receive(Duration::from_secs(1))?;
//! }
//! # Ok::<(), shmslot::ChannelError>(())
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod name;
pub mod payload;
pub mod shm;

// Re-export commonly used types
pub use channel::SharedSlotChannel;
pub use config::{ChannelConfig, ConnectConfig, ResetMode, SignalConfig};
pub use error::{ChannelError, ChannelResult};
pub use name::{segment_name, signal_name, ChannelName};
pub use payload::SlotPayload;
