// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::OceError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Thread-safe cancellation flag shared between a caller and a running
/// detection pipeline.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Receiver for coarse progress updates in `[0, 1]`.
pub trait ProgressSink: Sync {
    fn on_progress(&self, fraction: f32);
}

/// Execution context threaded through every detector call.
pub struct ExecutionContext<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub progress: Option<&'a dyn ProgressSink>,
}

impl Default for ExecutionContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context with no cancellation token and no progress hook.
    pub fn new() -> Self {
        Self {
            cancel: None,
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Returns a cancelled error when cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<(), OceError> {
        if self.is_cancelled() {
            return Err(OceError::cancelled());
        }
        Ok(())
    }

    /// Checks cancellation every `every` iterations.
    ///
    /// When `every` is zero, it is treated as one (always poll).
    pub fn check_cancelled_every(&self, iteration: usize, every: usize) -> Result<(), OceError> {
        let every = every.max(1);
        if iteration % every != 0 {
            return Ok(());
        }
        self.check_cancelled()
    }

    /// Emits clamped progress to the sink, if configured.
    pub fn report_progress(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }
        if let Some(sink) = self.progress {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, ExecutionContext, ProgressSink};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<f32>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, fraction: f32) {
            self.seen.lock().expect("sink mutex").push(fraction);
        }
    }

    #[test]
    fn new_context_has_no_hooks_and_is_not_cancelled() {
        let ctx = ExecutionContext::new();
        assert!(ctx.cancel.is_none());
        assert!(ctx.progress.is_none());
        assert!(!ctx.is_cancelled());
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn cancel_token_flips_context_state() {
        let cancel = CancelToken::new();
        let ctx = ExecutionContext::new().with_cancel(&cancel);

        assert!(ctx.check_cancelled().is_ok());
        cancel.cancel();
        let err = ctx.check_cancelled().expect_err("token was cancelled");
        assert_eq!(err.to_string(), "cancelled");
    }

    #[test]
    fn check_cancelled_every_polls_on_cadence() {
        let cancel = CancelToken::new();
        let ctx = ExecutionContext::new().with_cancel(&cancel);
        cancel.cancel();

        assert!(ctx.check_cancelled_every(1, 4).is_ok());
        assert!(ctx.check_cancelled_every(3, 4).is_ok());
        assert!(ctx.check_cancelled_every(4, 4).is_err());
        assert!(ctx.check_cancelled_every(0, 0).is_err(), "every=0 polls always");
    }

    #[test]
    fn report_progress_clamps_and_ignores_non_finite() {
        let sink = RecordingSink::default();
        let ctx = ExecutionContext::new().with_progress_sink(&sink);

        ctx.report_progress(-0.5);
        ctx.report_progress(0.4);
        ctx.report_progress(2.0);
        ctx.report_progress(f32::NAN);

        let got = sink.seen.lock().expect("sink mutex").clone();
        assert_eq!(got, vec![0.0, 0.4, 1.0]);
    }

    #[test]
    fn report_progress_is_noop_without_sink() {
        let ctx = ExecutionContext::new();
        ctx.report_progress(0.5);
        ctx.report_progress(f32::INFINITY);
    }
}
