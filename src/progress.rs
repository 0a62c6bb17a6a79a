//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline classifies and OCRs each page.
//!
//! # Example
//!
//! ```rust
//! use pdf_transcode::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct OcrCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for OcrCounter {
//!     fn on_ocr_complete(&self, page_num: usize, chars: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}: {chars} chars recognised");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(OcrCounter { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::model::PageContentKind;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. OCR events may arrive concurrently and out of page
/// order; implementations must synchronise shared state themselves.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the page count is known, before any extraction.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page has been classified from its native structure.
    ///
    /// `kind` is `None` when the page has no usable native content and has
    /// been queued for OCR.
    fn on_page_classified(&self, page_num: usize, kind: Option<PageContentKind>) {
        let _ = (page_num, kind);
    }

    /// Called when OCR finishes for a page.
    fn on_ocr_complete(&self, page_num: usize, chars: usize) {
        let _ = (page_num, chars);
    }

    /// Called once after every page has content.
    fn on_conversion_complete(&self, total_pages: usize, content_found: bool) {
        let _ = (total_pages, content_found);
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

    struct TrackingCallback {
        queued_for_ocr: AtomicUsize,
        native: AtomicUsize,
        ocr_done: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_page_classified(&self, _page_num: usize, kind: Option<PageContentKind>) {
            match kind {
                None => self.queued_for_ocr.fetch_add(1, Ordering::SeqCst),
                Some(_) => self.native.fetch_add(1, Ordering::SeqCst),
            };
        }

        fn on_ocr_complete(&self, _page_num: usize, _chars: usize) {
            self.ocr_done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_page_classified(1, Some(PageContentKind::Tables));
        cb.on_ocr_complete(2, 0);
        cb.on_conversion_complete(5, false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            queued_for_ocr: AtomicUsize::new(0),
            native: AtomicUsize::new(0),
            ocr_done: AtomicUsize::new(0),
        };

        tracker.on_page_classified(1, Some(PageContentKind::NativeText));
        tracker.on_page_classified(2, None);
        tracker.on_page_classified(3, None);
        tracker.on_ocr_complete(3, 120);

        assert_eq!(tracker.native.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.queued_for_ocr.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.ocr_done.load(Ordering::SeqCst), 1);
    }
}
