// SPDX-License-Identifier: Apache-2.0

//! OS resource layer.
//!
//! Safe wrappers over the two named POSIX primitives a channel owns:
//! a shared memory segment holding the slot and a named semaphore used
//! as an event-style signal. Both are acquired as RAII values and
//! released (and, for the creating side, unlinked) on drop.

mod segment;
mod signal;

pub use segment::SharedSegment;
pub use signal::SlotSignal;
