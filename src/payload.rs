// SPDX-License-Identifier: Apache-2.0

//! Compile-time payload validity.
//!
//! A value placed in the shared slot is copied byte-for-byte between
//! address spaces, so it must not carry indirection of any kind: no
//! references, no raw pointers, no heap-owning types, at any nesting
//! depth. That constraint is a marker trait checked once at compile
//! time, recursive by construction: a composite can only implement the
//! trait if its author vouches for every field.

/// Marker trait for types that are safe to place in the shared slot.
///
/// # Safety
///
/// Implementors must guarantee, recursively for every field at every
/// nesting depth, that the type:
///
/// - contains no references, raw pointers, or heap-owning values
///   (`Box`, `Vec`, `String`, ...),
/// - contains no interior mutability (`Cell`, atomics used as locks),
/// - has a stable, fixed-size layout on both sides of the channel
///   (`#[repr(C)]` for structs shared across separately-built binaries),
/// - remains sound for any bit pattern a torn read of values written
///   through this API can produce. The slot is unsynchronized, so a
///   reader racing a writer can observe a mix of two peer-written
///   values on payloads wider than the platform word (the slot itself
///   starts zeroed and only ever holds peer-written bytes).
///
/// Primitives and arrays of payloads are provided. Composites opt in:
///
/// ```
/// use shmslot::SlotPayload;
///
/// #[repr(C)]
/// #[derive(Clone, Copy)]
/// struct Snapshot {
///     sequence: u64,
///     position: [f64; 3],
/// }
///
/// // SAFETY: all fields are plain fixed-size values, repr(C) layout.
/// unsafe impl SlotPayload for Snapshot {}
/// ```
///
/// Types holding indirection cannot be used as payloads:
///
/// ```compile_fail
/// use shmslot::SlotPayload;
///
/// fn assert_payload<T: SlotPayload>() {}
/// assert_payload::<&'static u64>();
/// ```
pub unsafe trait SlotPayload: Copy + Sized + 'static {}

macro_rules! impl_slot_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: primitive fixed-size value type, no indirection.
            unsafe impl SlotPayload for $ty {}
        )*
    };
}

impl_slot_payload!(u8, u16, u32, u64, u128, usize);
impl_slot_payload!(i8, i16, i32, i64, i128, isize);
impl_slot_payload!(f32, f64);
impl_slot_payload!(bool);

// SAFETY: an array of payloads holds no indirection the elements don't.
unsafe impl<T: SlotPayload, const N: usize> SlotPayload for [T; N] {}
