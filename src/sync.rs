//! Atomics and interior-mutability cells used by the ring.
//!
//! Under `--cfg loom` these resolve to loom's model-checked versions so the
//! producer/consumer protocol can be explored exhaustively in `tests/loom_tests.rs`.

#[cfg(loom)]
pub(crate) use loom::cell::UnsafeCell;
#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicUsize, Ordering};

/// Mirror of loom's `UnsafeCell` API over `core::cell::UnsafeCell`.
#[cfg(not(loom))]
#[derive(Debug)]
pub(crate) struct UnsafeCell<T>(core::cell::UnsafeCell<T>);

#[cfg(not(loom))]
impl<T> UnsafeCell<T> {
    #[inline(always)]
    pub(crate) const fn new(value: T) -> Self {
        Self(core::cell::UnsafeCell::new(value))
    }

    #[inline(always)]
    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        f(self.0.get())
    }

    #[inline(always)]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }
}

/// Allocate `capacity` empty slots, or `None` if the allocator refuses.
#[cfg(not(loom))]
pub(crate) fn uninit_slots<T>(
    capacity: usize,
) -> Option<Box<[UnsafeCell<core::mem::MaybeUninit<T>>]>> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(capacity).ok()?;
    // SAFETY: `UnsafeCell<MaybeUninit<T>>` places no requirement on its
    // contents, so reserved memory is already a valid slot. This also keeps
    // zero-sized `T` O(1) for any capacity.
    unsafe { slots.set_len(capacity) };
    Some(slots.into_boxed_slice())
}

#[cfg(loom)]
pub(crate) fn uninit_slots<T>(
    capacity: usize,
) -> Option<Box<[UnsafeCell<core::mem::MaybeUninit<T>>]>> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(capacity).ok()?;
    slots.extend((0..capacity).map(|_| UnsafeCell::new(core::mem::MaybeUninit::uninit())));
    Some(slots.into_boxed_slice())
}
