// SPDX-License-Identifier: Apache-2.0

//! SlotSignal - named POSIX semaphore used as an event.
//!
//! The channel needs Windows-event-style semantics: "at least one write
//! has occurred since last consumed", with repeated notifications
//! collapsing into a single pending one. A counting semaphore gives that
//! when the count is capped at one: `notify` posts only from zero, an
//! auto-reset wait consumes the single token, a manual-reset wait puts
//! it back so the signal stays set until explicitly reset.

use std::ffi::CString;
use std::time::Duration;

use crate::config::{ResetMode, SignalConfig};
use crate::error::ChannelError;

/// A named signal backed by a POSIX semaphore.
///
/// The creating side owns the name and unlinks it on drop. Both peers
/// must agree on the reset mode; it is configuration, not stored in the
/// semaphore itself.
pub struct SlotSignal {
    /// Global OS name of the semaphore (leading slash included).
    name: String,
    /// Raw semaphore handle from sem_open.
    sem: *mut libc::sem_t,
    /// Wait-side semantics shared by both peers.
    reset_mode: ResetMode,
    /// Whether this instance created the semaphore (and unlinks on drop).
    is_owner: bool,
}

// SAFETY: the sem_t handle is process-wide; POSIX semaphore operations
// are thread-safe, and the handle stays valid until sem_close in drop.
unsafe impl Send for SlotSignal {}
unsafe impl Sync for SlotSignal {}

fn c_name(name: &str) -> Result<CString, ChannelError> {
    CString::new(name).map_err(|e| ChannelError::InvalidConfig {
        field: "signal_name",
        reason: format!("Invalid name: {}", e),
    })
}

impl SlotSignal {
    /// Create a new named signal.
    ///
    /// # Errors
    /// - `Conflict` if the name is already in use on the host.
    /// - `CreateFailed` on any other OS failure.
    pub fn create(name: &str, config: SignalConfig) -> Result<Self, ChannelError> {
        let c_name = c_name(name)?;
        let initial: libc::c_uint = if config.initially_set { 1 } else { 0 };

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::mode_t,
                initial,
            )
        };

        if sem == libc::SEM_FAILED {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EEXIST) {
                return Err(ChannelError::Conflict {
                    name: name.to_string(),
                });
            }
            return Err(ChannelError::CreateFailed {
                name: name.to_string(),
                reason: format!("sem_open failed: {}", errno),
            });
        }

        tracing::debug!(name = %name, initially_set = config.initially_set, "Created signal");

        Ok(Self {
            name: name.to_string(),
            sem,
            reset_mode: config.reset_mode,
            is_owner: true,
        })
    }

    /// Attach to an existing named signal.
    ///
    /// # Errors
    /// - `NotFound` if no signal of that name exists yet (transient,
    ///   retried by the connect loop).
    /// - `AttachFailed` for any other failure (fatal).
    pub fn open(name: &str, reset_mode: ResetMode) -> Result<Self, ChannelError> {
        let c_name = c_name(name)?;

        // SAFETY: c_name is a valid CString
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };

        if sem == libc::SEM_FAILED {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(ChannelError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(ChannelError::AttachFailed {
                name: name.to_string(),
                reason: format!("sem_open failed: {}", errno),
            });
        }

        tracing::debug!(name = %name, "Attached to signal");

        Ok(Self {
            name: name.to_string(),
            sem,
            reset_mode,
            is_owner: false,
        })
    }

    /// Get the global OS name of this signal.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the signal.
    ///
    /// Posts only when no notification is pending, so rapid successive
    /// notifies collapse into one - the signal carries occurrence, not
    /// count. Setting an already-set signal is a no-op.
    pub fn notify(&self) -> Result<(), ChannelError> {
        if self.value()? > 0 {
            return Ok(());
        }

        // SAFETY: sem is a valid handle until drop
        let result = unsafe { libc::sem_post(self.sem) };
        if result < 0 {
            return Err(ChannelError::SignalFailed {
                op: "notify",
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        Ok(())
    }

    /// Block the calling thread until the signal is set or `timeout`
    /// elapses. `Duration::MAX` waits without bound.
    ///
    /// Under `ResetMode::Auto` a satisfied wait consumes the pending
    /// notification; under `ResetMode::Manual` the signal stays set
    /// until [`reset`](Self::reset).
    ///
    /// # Errors
    /// `ReceiveTimeout` when the timeout elapses without a notification.
    pub fn wait(&self, timeout: Duration) -> Result<(), ChannelError> {
        if timeout == Duration::MAX {
            loop {
                // SAFETY: sem is a valid handle until drop
                let result = unsafe { libc::sem_wait(self.sem) };
                if result == 0 {
                    break;
                }
                let errno = std::io::Error::last_os_error();
                if errno.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(ChannelError::SignalFailed {
                    op: "wait",
                    reason: errno.to_string(),
                });
            }
        } else {
            let deadline = Self::absolute_deadline(timeout)?;
            loop {
                // SAFETY: sem is valid, deadline is a well-formed timespec
                let result = unsafe { libc::sem_timedwait(self.sem, &deadline) };
                if result == 0 {
                    break;
                }
                let errno = std::io::Error::last_os_error();
                match errno.raw_os_error() {
                    Some(libc::EINTR) => continue,
                    Some(libc::ETIMEDOUT) => return Err(ChannelError::ReceiveTimeout),
                    _ => {
                        return Err(ChannelError::SignalFailed {
                            op: "wait",
                            reason: errno.to_string(),
                        })
                    }
                }
            }
        }

        if self.reset_mode == ResetMode::Manual {
            // Put the token back so the signal stays set.
            // SAFETY: sem is a valid handle until drop
            let result = unsafe { libc::sem_post(self.sem) };
            if result < 0 {
                return Err(ChannelError::SignalFailed {
                    op: "wait",
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Clear any pending notification. Only meaningful under
    /// `ResetMode::Manual`; a no-op when the signal is not set.
    pub fn reset(&self) -> Result<(), ChannelError> {
        loop {
            // SAFETY: sem is a valid handle until drop
            let result = unsafe { libc::sem_trywait(self.sem) };
            if result == 0 {
                continue;
            }
            let errno = std::io::Error::last_os_error();
            match errno.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(()),
                Some(libc::EINTR) => continue,
                _ => {
                    return Err(ChannelError::SignalFailed {
                        op: "reset",
                        reason: errno.to_string(),
                    })
                }
            }
        }
    }

    /// Current semaphore value (0 when unset, 1 when set).
    fn value(&self) -> Result<i32, ChannelError> {
        let mut value: libc::c_int = 0;
        // SAFETY: sem is valid, value is a valid out-pointer
        let result = unsafe { libc::sem_getvalue(self.sem, &mut value) };
        if result < 0 {
            return Err(ChannelError::SignalFailed {
                op: "getvalue",
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        Ok(value)
    }

    /// Absolute CLOCK_REALTIME deadline for sem_timedwait.
    fn absolute_deadline(timeout: Duration) -> Result<libc::timespec, ChannelError> {
        let mut now = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: now is a valid out-pointer
        let result = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) };
        if result < 0 {
            return Err(ChannelError::SignalFailed {
                op: "wait",
                reason: std::io::Error::last_os_error().to_string(),
            });
        }

        let secs = i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX);
        let mut tv_sec = now.tv_sec.saturating_add(secs as libc::time_t);
        let mut tv_nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
        if tv_nsec >= 1_000_000_000 {
            tv_nsec -= 1_000_000_000;
            tv_sec = tv_sec.saturating_add(1);
        }

        Ok(libc::timespec { tv_sec, tv_nsec })
    }
}

impl Drop for SlotSignal {
    fn drop(&mut self) {
        // SAFETY: sem was opened during creation
        let result = unsafe { libc::sem_close(self.sem) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to close signal"
            );
        }

        if self.is_owner {
            if let Ok(c_name) = CString::new(self.name.as_str()) {
                // SAFETY: c_name is a valid CString
                unsafe { libc::sem_unlink(c_name.as_ptr()) };
                tracing::debug!(name = %self.name, "Unlinked signal");
            }
        }
    }
}
