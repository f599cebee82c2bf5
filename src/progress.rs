//! Progress-callback trait for per-region conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as regions are synthesized.
//!
//! # Example
//!
//! ```rust
//! use imagecoderx::{ConversionConfig, ConversionProgressCallback, FragmentKind};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_region_complete(&self, index: usize, total: usize, kind: FragmentKind, _len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("region {index} ({}) done, {done}/{total}", kind.as_str());
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::FragmentKind;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each region.
///
/// Regions are synthesized concurrently, so `on_region_*` may be called from
/// several tasks at once and in any order. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once segmentation has produced the region list.
    fn on_conversion_start(&self, total_regions: usize) {
        let _ = total_regions;
    }

    /// Called before a region is cropped and sent to the collaborators.
    ///
    /// `index` is 0-based in segmentation order.
    fn on_region_start(&self, index: usize, total_regions: usize) {
        let _ = (index, total_regions);
    }

    /// Called when a region produced its fragment.
    ///
    /// `markup_len` is the byte length of the synthesized markup (0 for
    /// asset-backed fragments).
    fn on_region_complete(&self, index: usize, total_regions: usize, kind: FragmentKind, markup_len: usize) {
        let _ = (index, total_regions, kind, markup_len);
    }

    /// Called when a region was replaced by a placeholder.
    fn on_region_error(&self, index: usize, total_regions: usize, error: &str) {
        let _ = (index, total_regions, error);
    }

    /// Called once after every region has been attempted.
    fn on_conversion_complete(&self, total_regions: usize, success_count: usize) {
        let _ = (total_regions, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_regions: usize) {
            self.started_total.store(total_regions, Ordering::SeqCst);
        }

        fn on_region_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_region_complete(&self, _index: usize, _total: usize, _kind: FragmentKind, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_region_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(3);
        cb.on_region_start(0, 3);
        cb.on_region_complete(0, 3, FragmentKind::Code, 42);
        cb.on_region_error(1, 3, "ocr failed");
        cb.on_conversion_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start(2);
        tracker.on_region_start(0, 2);
        tracker.on_region_complete(0, 2, FragmentKind::Logo, 0);
        tracker.on_region_start(1, 2);
        tracker.on_region_error(1, 2, "llm timeout");
        tracker.on_conversion_complete(2, 1);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(10);
        cb.on_region_complete(3, 10, FragmentKind::Background, 0);
    }
}
