//! Lock-free primitives for the audio thread.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use atomic_float::AtomicF32;

/// Cache-line aligned atomic f32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFloat {
    value: AtomicF32,
}

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: f32) -> f32 {
        self.value.swap(value, Ordering::AcqRel)
    }

    /// Stores `value` if it is larger. Returns true if it was stored.
    #[inline]
    pub fn fetch_max(&self, value: f32) -> bool {
        let mut current = self.value.load(Ordering::Relaxed);
        while value > current {
            match self.value.compare_exchange_weak(
                current,
                value,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Unsynchronized cell for state owned by one graph node.
///
/// Graph ordering guarantees a single writer per cycle and that readers only
/// run after the writer has finished (the refcount handoff is an
/// acquire/release pair). Control-thread access is only allowed while no
/// cycle is running.
pub struct RtCell<T> {
    value: UnsafeCell<T>,
}

// SAFETY: RtCell is safe to share because:
// - writes happen only from the node that owns the value, inside its process call
// - readers are scheduled after the writer via the atomic refcount handoff
// - storage is replaced only by the audio thread at cycle start, or before
//   any cycle can see it
unsafe impl<T: Send> Send for RtCell<T> {}
unsafe impl<T: Send> Sync for RtCell<T> {}

impl<T> RtCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    /// # Safety
    /// No other reference obtained from [`get_mut`](Self::get_mut) may be live.
    #[inline]
    pub unsafe fn get(&self) -> &T {
        &*self.value.get()
    }

    /// # Safety
    /// The caller must be the only accessor for the lifetime of the reference.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub unsafe fn get_mut(&self) -> &mut T {
        &mut *self.value.get()
    }
}

impl<T: Default> Default for RtCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
