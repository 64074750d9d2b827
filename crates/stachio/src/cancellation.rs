/*
 * cancellation.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Cooperative cancellation for a single render.
 */

//! Cancellation and timeout for a single render.
//!
//! A [`RenderSignal`] folds the caller's `CancellationToken` and the render
//! deadline into one handle. The renderer polls it before every item, so a
//! timeout is just a cancellation that fires once the deadline has passed.

use crate::error::TemplateError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct RenderSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    timed_out: AtomicBool,
}

impl RenderSignal {
    /// Compose the caller's token (if any) with an optional timeout.
    ///
    /// The internal token is a child of the caller's, so cancelling the
    /// caller cancels the render but a timeout never cancels the caller.
    pub fn new(caller: Option<&CancellationToken>, timeout: Option<Duration>) -> Self {
        let token = caller.map_or_else(CancellationToken::new, CancellationToken::child_token);
        // A timeout too large to reach is no timeout.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        Self {
            token,
            deadline,
            timeout: deadline.and(timeout),
            timed_out: AtomicBool::new(false),
        }
    }

    /// A signal that never fires.
    pub fn none() -> Self {
        Self::new(None, None)
    }

    /// The composed token; cancelled on caller cancellation or timeout.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Poll the signal.
    pub fn check(&self) -> Result<(), TemplateError> {
        if self.token.is_cancelled() {
            return Err(self.stop_reason());
        }
        if let (Some(deadline), Some(timeout)) = (self.deadline, self.timeout) {
            if Instant::now() >= deadline {
                self.timed_out.store(true, Ordering::Relaxed);
                self.token.cancel();
                return Err(TemplateError::Timeout { timeout });
            }
        }
        Ok(())
    }

    fn stop_reason(&self) -> TemplateError {
        match self.timeout {
            Some(timeout) if self.timed_out() => TemplateError::Timeout { timeout },
            _ => TemplateError::Cancelled,
        }
    }
}

impl Default for RenderSignal {
    fn default() -> Self {
        Self::none()
    }
}
