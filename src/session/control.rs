//! Cancellation, progress and host platform hooks for a session.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::protocol::Request;

/// Polled before every request is sent and once per dispatched response.
pub trait AbortSource: Send + Sync {
    fn is_aborted(&self) -> bool;
}

/// Shared abort flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl AbortSource for AbortFlag {
    fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Never aborts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverAbort;

impl AbortSource for NeverAbort {
    fn is_aborted(&self) -> bool {
        false
    }
}

/// Progress notifications. Never consulted for control flow.
pub trait ProgressHandler {
    fn valid_requests_received(&mut self, _requests: &HashSet<String>) {}

    /// Called after each batched request (and its file payload) was written.
    fn request_sent(&mut self, request: &Request);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressHandler for NoProgress {
    fn request_sent(&mut self, _request: &Request) {}
}

/// Host properties that change what is negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Platform {
    /// File names compare case-insensitively, so the server is sent `Case`.
    pub case_insensitive: bool,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            case_insensitive: cfg!(windows),
        }
    }

    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}
