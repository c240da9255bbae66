//! Progress callbacks for long-running weighting passes.
//!
//! Heat weighting solves one linear system per bone, which can take a while
//! on dense meshes with many bones. Callers that want feedback pass a
//! [`Progress`] to the `*_with_progress` entry points.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use laplace_rig::algo::progress::Progress;
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let progress = Progress::new(move |current, total, _message| {
//!     assert!(current <= total);
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! progress.report(0, 2, "Bone heat weighting");
//! progress.report(2, 2, "Bone heat weighting");
//! assert_eq!(seen.load(Ordering::Relaxed), 2);
//! ```

/// A callback receiving `(current, total, message)` updates.
///
/// `current` counts finished steps, so a run of `total` steps reports
/// `0..total` while working and `total` once done.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Forward an update to the callback.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report the final step of a run of `total` steps.
    #[inline]
    pub fn finish(&self, total: usize, message: &str) {
        self.report(total, total, message);
    }

    /// A reporter that drops every update.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
