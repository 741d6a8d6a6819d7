//! In-memory connection that replays a canned server transcript.
//!
//! Used by the test suites and for offline replay of captured `.in` logs.
//! Everything the client writes is captured and exposed through a
//! [`ScriptHandle`], together with open/close counters.

use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{not_open, Connection, ConnectionLogger};
use crate::error::Result;

#[derive(Default)]
struct ScriptState {
    output: Mutex<Vec<u8>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

/// Read-side view of a [`ScriptedConnection`] that outlives it.
#[derive(Clone)]
pub struct ScriptHandle {
    state: Arc<ScriptState>,
}

impl ScriptHandle {
    /// Everything the client has written so far.
    pub fn output(&self) -> Vec<u8> {
        self.state
            .output
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

pub struct ScriptedConnection {
    repository: String,
    transcript: Option<Vec<u8>>,
    state: Arc<ScriptState>,
    fail_output: bool,
    reject_open: Option<String>,
}

impl ScriptedConnection {
    pub fn new(transcript: impl Into<Vec<u8>>) -> (Self, ScriptHandle) {
        let state = Arc::new(ScriptState::default());
        let connection = Self {
            repository: "/cvsroot".to_string(),
            transcript: Some(transcript.into()),
            state: state.clone(),
            fail_output: false,
            reject_open: None,
        };
        (connection, ScriptHandle { state })
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    /// Every write and flush on the output stream fails.
    pub fn with_failing_output(mut self) -> Self {
        self.fail_output = true;
        self
    }

    /// `open` fails as if the server refused the credentials.
    pub fn rejecting_open(mut self, message: impl Into<String>) -> Self {
        self.reject_open = Some(message.into());
        self
    }
}

impl Connection for ScriptedConnection {
    fn open(&mut self, _logger: &dyn ConnectionLogger) -> Result<()> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        match &self.reject_open {
            Some(message) => Err(super::auth_error(message)),
            None => Ok(()),
        }
    }

    fn input_stream(&mut self) -> io::Result<Box<dyn Read + Send>> {
        let transcript = self.transcript.take().ok_or_else(not_open)?;
        Ok(Box::new(Cursor::new(transcript)))
    }

    fn output_stream(&mut self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(CapturedOutput {
            state: self.state.clone(),
            fail: self.fail_output,
        }))
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CapturedOutput {
    state: Arc<ScriptState>,
    fail: bool,
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted write failure"));
        }
        self.state
            .output
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted flush failure"));
        }
        Ok(())
    }
}
