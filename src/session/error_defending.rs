//! Circuit breaker around a [`ResponseHandler`].
//!
//! Every call is forwarded unchanged. `error` and `E` responses extend the
//! current run of errors, any other response ends it. [`interrupt`] reports
//! a session that keeps failing: 50 errors in a row, or errors arriving for
//! longer than the configured timeout.
//!
//! [`interrupt`]: ErrorDefendingResponseHandler::interrupt

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::protocol::{EntryPath, EntryUpdate, FileUpdate, ResponseHandler, ResponseKind};

pub const MAX_CONSECUTIVE_ERRORS: u32 = 50;

pub struct ErrorDefendingResponseHandler<'a, H: ResponseHandler + ?Sized> {
    inner: &'a mut H,
    consecutive_errors: u32,
    /// Set iff `consecutive_errors > 0`
    error_run_start: Option<Instant>,
    timeout: Duration,
}

impl<'a, H: ResponseHandler + ?Sized> ErrorDefendingResponseHandler<'a, H> {
    /// A zero `timeout` disables the time limit.
    pub fn new(inner: &'a mut H, timeout: Duration) -> Self {
        Self {
            inner,
            consecutive_errors: 0,
            error_run_start: None,
            timeout,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn error_run_start(&self) -> Option<Instant> {
        self.error_run_start
    }

    /// True once the session looks stuck. Has no side effects.
    pub fn interrupt(&self) -> bool {
        if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            return true;
        }
        match self.error_run_start {
            Some(start) if !self.timeout.is_zero() => start.elapsed() > self.timeout,
            _ => false,
        }
    }

    fn track(
        &mut self,
        kind: ResponseKind,
        forward: impl FnOnce(&mut H) -> Result<()>,
    ) -> Result<()> {
        let result = forward(&mut *self.inner);
        if kind.is_error() {
            self.consecutive_errors = self.consecutive_errors.saturating_add(1);
            self.error_run_start.get_or_insert_with(Instant::now);
        } else {
            self.consecutive_errors = 0;
            self.error_run_start = None;
        }
        result
    }
}

impl<H: ResponseHandler + ?Sized> ResponseHandler for ErrorDefendingResponseHandler<'_, H> {
    fn ok(&mut self) -> Result<()> {
        self.track(ResponseKind::Ok, |h| h.ok())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        self.track(ResponseKind::Error, |h| h.error(message))
    }

    fn error_message(&mut self, text: &str) -> Result<()> {
        self.track(ResponseKind::ErrorMessage, |h| h.error_message(text))
    }

    fn file_message(&mut self) -> Result<()> {
        self.track(ResponseKind::FileMessage, |h| h.file_message())
    }

    fn message(&mut self, text: &str) -> Result<()> {
        self.track(ResponseKind::Message, |h| h.message(text))
    }

    fn tagged_message(&mut self, tag: &str, text: Option<&str>) -> Result<()> {
        self.track(ResponseKind::TaggedMessage, |h| h.tagged_message(tag, text))
    }

    fn binary_message(&mut self, data: &[u8]) -> Result<()> {
        self.track(ResponseKind::BinaryMessage, |h| h.binary_message(data))
    }

    fn valid_requests(&mut self, requests: &[String]) -> Result<()> {
        self.track(ResponseKind::ValidRequests, |h| h.valid_requests(requests))
    }

    fn checked_in(&mut self, update: &EntryUpdate) -> Result<()> {
        self.track(ResponseKind::CheckedIn, |h| h.checked_in(update))
    }

    fn new_entry(&mut self, update: &EntryUpdate) -> Result<()> {
        self.track(ResponseKind::NewEntry, |h| h.new_entry(update))
    }

    fn checksum(&mut self, checksum: &str) -> Result<()> {
        self.track(ResponseKind::Checksum, |h| h.checksum(checksum))
    }

    fn copy_file(&mut self, path: &EntryPath, new_name: &str) -> Result<()> {
        self.track(ResponseKind::CopyFile, |h| h.copy_file(path, new_name))
    }

    fn updated(&mut self, file: &FileUpdate) -> Result<()> {
        self.track(ResponseKind::Updated, |h| h.updated(file))
    }

    fn created(&mut self, file: &FileUpdate) -> Result<()> {
        self.track(ResponseKind::Created, |h| h.created(file))
    }

    fn update_existing(&mut self, file: &FileUpdate) -> Result<()> {
        self.track(ResponseKind::UpdateExisting, |h| h.update_existing(file))
    }

    fn merged(&mut self, file: &FileUpdate) -> Result<()> {
        self.track(ResponseKind::Merged, |h| h.merged(file))
    }

    fn patched(&mut self, file: &FileUpdate) -> Result<()> {
        self.track(ResponseKind::Patched, |h| h.patched(file))
    }

    fn rcs_diff(&mut self, file: &FileUpdate) -> Result<()> {
        self.track(ResponseKind::RcsDiff, |h| h.rcs_diff(file))
    }

    fn mode(&mut self, mode: &str) -> Result<()> {
        self.track(ResponseKind::Mode, |h| h.mode(mode))
    }

    fn mod_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        self.track(ResponseKind::ModTime, |h| h.mod_time(time))
    }

    fn removed(&mut self, path: &EntryPath) -> Result<()> {
        self.track(ResponseKind::Removed, |h| h.removed(path))
    }

    fn remove_entry(&mut self, path: &EntryPath) -> Result<()> {
        self.track(ResponseKind::RemoveEntry, |h| h.remove_entry(path))
    }

    fn set_static_directory(&mut self, path: &EntryPath) -> Result<()> {
        self.track(ResponseKind::SetStaticDirectory, |h| {
            h.set_static_directory(path)
        })
    }

    fn clear_static_directory(&mut self, path: &EntryPath) -> Result<()> {
        self.track(ResponseKind::ClearStaticDirectory, |h| {
            h.clear_static_directory(path)
        })
    }

    fn set_sticky(&mut self, path: &EntryPath, tag: &str) -> Result<()> {
        self.track(ResponseKind::SetSticky, |h| h.set_sticky(path, tag))
    }

    fn clear_sticky(&mut self, path: &EntryPath) -> Result<()> {
        self.track(ResponseKind::ClearSticky, |h| h.clear_sticky(path))
    }

    fn template(&mut self, path: &EntryPath, content: &[u8]) -> Result<()> {
        self.track(ResponseKind::Template, |h| h.template(path, content))
    }

    fn set_checkin_prog(&mut self, directory: &str, program: &str) -> Result<()> {
        self.track(ResponseKind::SetCheckinProg, |h| {
            h.set_checkin_prog(directory, program)
        })
    }

    fn set_update_prog(&mut self, directory: &str, program: &str) -> Result<()> {
        self.track(ResponseKind::SetUpdateProg, |h| {
            h.set_update_prog(directory, program)
        })
    }

    fn notified(&mut self, path: &EntryPath) -> Result<()> {
        self.track(ResponseKind::Notified, |h| h.notified(path))
    }

    fn module_expansion(&mut self, module: &str) -> Result<()> {
        self.track(ResponseKind::ModuleExpansion, |h| h.module_expansion(module))
    }

    fn wrapper_rcs_option(&mut self, option: &str) -> Result<()> {
        self.track(ResponseKind::WrapperRcsOption, |h| {
            h.wrapper_rcs_option(option)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageCollector;
    use std::thread;

    #[test]
    fn test_ok_resets_error_run() {
        let mut collector = MessageCollector::default();
        let mut handler = ErrorDefendingResponseHandler::new(&mut collector, Duration::ZERO);

        handler.error_message("one").unwrap();
        handler.error_message("two").unwrap();
        assert_eq!(handler.consecutive_errors(), 2);
        assert!(handler.error_run_start().is_some());

        handler.message("progress").unwrap();
        assert_eq!(handler.consecutive_errors(), 0);
        assert!(handler.error_run_start().is_none());
    }

    #[test]
    fn test_error_run_keeps_first_timestamp() {
        let mut collector = MessageCollector::default();
        let mut handler = ErrorDefendingResponseHandler::new(&mut collector, Duration::ZERO);

        handler.error("first").unwrap();
        let start = handler.error_run_start();
        handler.error("second").unwrap();
        assert_eq!(handler.error_run_start(), start);
    }

    #[test]
    fn test_ceiling_trips_without_timeout() {
        let mut collector = MessageCollector::default();
        let mut handler = ErrorDefendingResponseHandler::new(&mut collector, Duration::ZERO);

        for _ in 0..MAX_CONSECUTIVE_ERRORS - 1 {
            handler.error_message("again").unwrap();
        }
        assert!(!handler.interrupt());

        handler.error_message("again").unwrap();
        assert!(handler.interrupt());
        // Querying twice changes nothing
        assert!(handler.interrupt());
        assert_eq!(handler.consecutive_errors(), MAX_CONSECUTIVE_ERRORS);
    }

    #[test]
    fn test_timeout_trips_below_ceiling() {
        let mut collector = MessageCollector::default();
        let mut handler =
            ErrorDefendingResponseHandler::new(&mut collector, Duration::from_millis(10));

        assert!(!handler.interrupt());
        handler.error_message("slow").unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(handler.interrupt());

        handler.ok().unwrap();
        assert!(!handler.interrupt());
    }

    #[test]
    fn test_forwards_everything() {
        // "E file not found" then "ok"
        let mut collector = MessageCollector::default();
        {
            let mut handler =
                ErrorDefendingResponseHandler::new(&mut collector, Duration::from_secs(60));
            handler.error_message("file not found").unwrap();
            assert_eq!(handler.consecutive_errors(), 1);
            handler.ok().unwrap();
            assert_eq!(handler.consecutive_errors(), 0);
            assert!(handler.error_run_start().is_none());
        }
        assert_eq!(collector.errors, vec!["file not found"]);
    }
}
