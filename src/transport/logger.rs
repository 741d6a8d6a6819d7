//! Wire traffic observers.
//!
//! A logger sees every byte that crosses the connection after compression has
//! been undone, without altering it.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait ConnectionLogger: Send + Sync {
    /// Bytes received from the server.
    fn log_input(&self, data: &[u8]);

    /// Bytes sent to the server.
    fn log_output(&self, data: &[u8]);
}

/// Discards all traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl ConnectionLogger for NoopLogger {
    fn log_input(&self, _data: &[u8]) {}
    fn log_output(&self, _data: &[u8]) {}
}

/// Emits traffic as `trace` events on the `cvsclient::wire` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ConnectionLogger for TracingLogger {
    fn log_input(&self, data: &[u8]) {
        tracing::trace!(target: "cvsclient::wire", "S: {}", String::from_utf8_lossy(data));
    }

    fn log_output(&self, data: &[u8]) {
        tracing::trace!(target: "cvsclient::wire", "C: {}", String::from_utf8_lossy(data));
    }
}

/// Tees traffic into `<prefix>.in` and `<prefix>.out`.
pub struct FileLogger {
    input: Mutex<File>,
    output: Mutex<File>,
}

impl FileLogger {
    pub fn create(prefix: &Path) -> io::Result<Self> {
        Ok(Self {
            input: Mutex::new(File::create(with_suffix(prefix, "in"))?),
            output: Mutex::new(File::create(with_suffix(prefix, "out"))?),
        })
    }

    fn append(file: &Mutex<File>, data: &[u8]) {
        // A poisoned lock only means another writer panicked mid-write
        let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_all(data) {
            tracing::warn!("Failed to write protocol log: {}", e);
        }
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

impl ConnectionLogger for FileLogger {
    fn log_input(&self, data: &[u8]) {
        Self::append(&self.input, data);
    }

    fn log_output(&self, data: &[u8]) {
        Self::append(&self.output, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_logger_splits_directions() {
        let temp = TempDir::new().unwrap();
        let prefix = temp.path().join("session");

        let logger = FileLogger::create(&prefix).unwrap();
        logger.log_output(b"valid-requests\n");
        logger.log_input(b"ok\n");
        drop(logger);

        let out = std::fs::read_to_string(temp.path().join("session.out")).unwrap();
        let inp = std::fs::read_to_string(temp.path().join("session.in")).unwrap();
        assert_eq!(out, "valid-requests\n");
        assert_eq!(inp, "ok\n");
    }
}
