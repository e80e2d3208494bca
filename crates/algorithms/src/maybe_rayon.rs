//! Row iteration that is parallel with the `parallel` feature and plain
//! sequential iteration without it.
//!
//! Algorithms write `(0..rows).into_par_iter()` unconditionally; without
//! rayon the call resolves to `IntoIterator::into_iter` and the rest of the
//! chain (`flat_map`, `collect`, `unzip`) to the `Iterator` methods.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
pub use fallback::IntoParallelIterator;

#[cfg(not(feature = "parallel"))]
mod fallback {
    pub trait IntoParallelIterator: IntoIterator + Sized {
        fn into_par_iter(self) -> Self::IntoIter {
            self.into_iter()
        }
    }

    impl<I: IntoIterator> IntoParallelIterator for I {}
}
