//! SharedSegment - POSIX shared memory wrapper.
//!
//! One fixed-size mapping per channel direction: the creating side maps
//! it writable, the attaching side read-only. All unsafe operations are
//! encapsulated; errno decoding distinguishes the transient "peer not
//! created yet" case from fatal attach failures.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::ChannelError;

/// A named shared memory segment mapped at offset 0 for its full size.
///
/// The instance that created the segment owns the name and will unlink
/// it on drop; an attached instance only unmaps and closes.
#[derive(Debug)]
pub struct SharedSegment {
    /// Global OS name of the segment (leading slash included).
    name: String,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapping in bytes - exactly the payload size.
    size: usize,
    /// File descriptor of the shm object.
    fd: i32,
    /// Whether this instance created the segment (and unlinks on drop).
    is_owner: bool,
    /// Whether the mapping is writable.
    writable: bool,
}

// SAFETY: SharedSegment owns its mapping and fd; moving it between
// threads does not move the mapping.
unsafe impl Send for SharedSegment {}

// SAFETY: shared access is raw-pointer based; synchronization of the
// slot contents is the caller's contract, not this type's.
unsafe impl Sync for SharedSegment {}

fn c_name(name: &str) -> Result<CString, ChannelError> {
    CString::new(name).map_err(|e| ChannelError::InvalidConfig {
        field: "segment_name",
        reason: format!("Invalid name: {}", e),
    })
}

impl SharedSegment {
    /// Create a new segment of exactly `size` bytes, mapped writable.
    ///
    /// # Errors
    /// - `Conflict` if the name is already in use on the host.
    /// - `CreateFailed` / `MapFailed` on any other OS failure. A
    ///   half-created segment is closed and unlinked before returning.
    pub fn create(name: &str, size: usize) -> Result<Self, ChannelError> {
        debug_assert!(size > 0, "segment size validated by the channel");
        let c_name = c_name(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EEXIST) {
                return Err(ChannelError::Conflict {
                    name: name.to_string(),
                });
            }
            return Err(ChannelError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // Size the object to exactly the payload size - no header.
        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(ChannelError::CreateFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        // SAFETY: fd is valid, size is non-zero, offset 0 is valid
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(ChannelError::MapFailed {
                name: name.to_string(),
                reason: format!("mmap failed: {}", errno),
            });
        }

        // Zero-initialize so a receiver attaching before the first send
        // reads a defined value.
        // SAFETY: ptr is valid for size bytes
        unsafe {
            std::ptr::write_bytes(ptr as *mut u8, 0, size);
        }

        let ptr = NonNull::new(ptr as *mut u8).expect("mmap returned null but not MAP_FAILED");

        tracing::debug!(name = %name, size = size, "Created shared segment");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
            is_owner: true,
            writable: true,
        })
    }

    /// Attach to an existing segment with a read-only mapping.
    ///
    /// # Errors
    /// - `NotFound` if no segment of that name exists yet (transient,
    ///   retried by the connect loop).
    /// - `AttachFailed` / `MapFailed` for any other failure (fatal).
    pub fn open(name: &str, size: usize) -> Result<Self, ChannelError> {
        debug_assert!(size > 0, "segment size validated by the channel");
        let c_name = c_name(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(ChannelError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(ChannelError::AttachFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // SAFETY: fd is valid, the creating side sized the object
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(ChannelError::MapFailed {
                name: name.to_string(),
                reason: format!("mmap failed: {}", errno),
            });
        }

        let ptr = NonNull::new(ptr as *mut u8).expect("mmap returned null but not MAP_FAILED");

        tracing::debug!(name = %name, size = size, "Attached to shared segment");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
            is_owner: false,
            writable: false,
        })
    }

    /// Get the global OS name of this segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the size of the mapping in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the mapping is writable (creating side only).
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Get a raw pointer to the slot.
    ///
    /// # Safety
    /// Caller must stay within `size` bytes and must not write through
    /// the pointer of a read-only mapping.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during creation
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared segment"
            );
        }

        // SAFETY: fd was opened during creation
        unsafe { libc::close(self.fd) };

        if self.is_owner {
            if let Ok(c_name) = CString::new(self.name.as_str()) {
                // SAFETY: c_name is a valid CString
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                tracing::debug!(name = %self.name, "Unlinked shared segment");
            }
        }
    }
}
