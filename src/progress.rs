//! Progress-callback trait for request and retry events.
//!
//! Inject an [`Arc<dyn RequestProgressCallback>`] via
//! [`crate::config::StudyConfigBuilder::progress_callback`] to observe what a
//! session is doing: document loads, each API attempt, and each backoff wait.
//! The CLI uses it to drive a spinner; a web front-end could forward events
//! over a socket instead. Transient failures are reported here rather than
//! to the caller, which only sees the final outcome.
//!
//! # Example
//!
//! ```rust
//! use edgequake_studybot::{RequestProgressCallback, StudyConfig, TransientKind};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use std::time::Duration;
//!
//! struct RetryCounter(AtomicUsize);
//!
//! impl RequestProgressCallback for RetryCounter {
//!     fn on_retry(&self, attempt: u32, kind: TransientKind, delay: Duration, _detail: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("attempt {attempt} failed ({kind}); waiting {delay:?}");
//!     }
//! }
//!
//! let config = StudyConfig::builder()
//!     .progress_callback(Arc::new(RetryCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::TransientKind;
use crate::mode::Mode;
use std::sync::Arc;
use std::time::Duration;

/// Called by a session as it handles requests.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait RequestProgressCallback: Send + Sync {
    /// A document finished loading (from cache or a fresh extraction).
    fn on_document_loaded(&self, source: &str, page_count: usize, cached: bool) {
        let _ = (source, page_count, cached);
    }

    /// A request is about to be handled.
    fn on_request_start(&self, mode: Mode) {
        let _ = mode;
    }

    /// An API attempt is about to be sent.
    ///
    /// # Arguments
    /// * `attempt`: 1-based attempt number
    /// * `max_attempts`: configured attempt budget
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// An attempt failed transiently and the client will wait `delay`.
    fn on_retry(&self, attempt: u32, kind: TransientKind, delay: Duration, detail: &str) {
        let _ = (attempt, kind, delay, detail);
    }

    /// The request finished, successfully or not.
    fn on_request_complete(&self, mode: Mode, success: bool) {
        let _ = (mode, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RequestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StudyConfig`].
pub type ProgressCallback = Arc<dyn RequestProgressCallback>;
