//! Lock-free cells shared between the scheduler thread and caller threads.

use atomic_float::{AtomicF32, AtomicF64};
use std::sync::atomic::{AtomicBool, Ordering};

macro_rules! atomic_cell {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $value:ty, $zero:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        #[repr(align(64))]
        pub struct $name {
            value: $inner,
        }

        impl $name {
            pub fn new(value: $value) -> Self {
                Self {
                    value: <$inner>::new(value),
                }
            }

            #[inline]
            pub fn get(&self) -> $value {
                self.value.load(Ordering::Acquire)
            }

            #[inline]
            pub fn set(&self, value: $value) {
                self.value.store(value, Ordering::Release);
            }

            #[inline]
            pub fn swap(&self, value: $value) -> $value {
                self.value.swap(value, Ordering::AcqRel)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new(self.get())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new($zero)
            }
        }
    };
}

atomic_cell!(
    /// Cache-line aligned atomic f32, used for parameter values.
    AtomicFloat,
    AtomicF32,
    f32,
    0.0
);

atomic_cell!(
    /// Cache-line aligned atomic f64, used for clock positions in seconds.
    AtomicDouble,
    AtomicF64,
    f64,
    0.0
);

atomic_cell!(
    /// Cache-line aligned atomic bool.
    AtomicFlag,
    AtomicBool,
    bool,
    false
);
