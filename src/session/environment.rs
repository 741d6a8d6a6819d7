//! Everything a session needs besides the connection itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{CvsError, Result};
use crate::files::{LocalFileReader, StandardFileReader};
use crate::session::control::{AbortSource, NeverAbort};
use crate::transport::{ConnectionLogger, FileLogger, TracingLogger};

#[derive(Clone)]
pub struct ClientEnvironment {
    pub config: ClientConfig,
    /// Working directory that relative file payloads resolve against.
    pub local_directory: PathBuf,
    pub file_reader: Arc<dyn LocalFileReader>,
    pub abort: Arc<dyn AbortSource>,
    pub logger: Arc<dyn ConnectionLogger>,
}

impl ClientEnvironment {
    /// Wire traffic goes to `tracing`; use [`with_protocol_log`] to honour
    /// `protocol_log` from the configuration.
    ///
    /// [`with_protocol_log`]: ClientEnvironment::with_protocol_log
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            local_directory: PathBuf::from("."),
            file_reader: Arc::new(StandardFileReader::default()),
            abort: Arc::new(NeverAbort),
            logger: Arc::new(TracingLogger),
        }
    }

    /// Tee traffic to `<protocol_log>.in` / `.out` if configured.
    pub fn with_protocol_log(mut self) -> Result<Self> {
        if let Some(prefix) = &self.config.protocol_log {
            let logger = FileLogger::create(prefix).map_err(|e| {
                CvsError::Config(format!(
                    "Cannot open protocol log {}: {}",
                    prefix.display(),
                    e
                ))
            })?;
            self.logger = Arc::new(logger);
        }
        Ok(self)
    }

    pub fn with_local_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.local_directory = directory.into();
        self
    }

    pub fn with_file_reader(mut self, reader: impl LocalFileReader + 'static) -> Self {
        self.file_reader = Arc::new(reader);
        self
    }

    pub fn with_abort(mut self, abort: impl AbortSource + 'static) -> Self {
        self.abort = Arc::new(abort);
        self
    }

    pub fn with_logger(mut self, logger: impl ConnectionLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// `path` as seen from the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.local_directory.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::control::AbortFlag;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_relative_paths() {
        let environment =
            ClientEnvironment::new(ClientConfig::default()).with_local_directory("/work");
        assert_eq!(
            environment.resolve(Path::new("src/main.c")),
            PathBuf::from("/work/src/main.c")
        );
        assert_eq!(
            environment.resolve(Path::new("/etc/motd")),
            PathBuf::from("/etc/motd")
        );
    }

    #[test]
    fn test_abort_is_shared() {
        let flag = AbortFlag::new();
        let environment = ClientEnvironment::new(ClientConfig::default()).with_abort(flag.clone());
        assert!(!environment.is_aborted());
        flag.abort();
        assert!(environment.is_aborted());
    }

    #[test]
    fn test_protocol_log_from_config() {
        let temp = TempDir::new().unwrap();
        let prefix = temp.path().join("session");
        let config = ClientConfig {
            protocol_log: Some(prefix.clone()),
            ..ClientConfig::default()
        };

        let environment = ClientEnvironment::new(config).with_protocol_log().unwrap();
        environment.logger.log_output(b"noop\n");
        drop(environment);

        assert_eq!(fs::read(prefix.with_extension("out")).unwrap(), b"noop\n");
    }

    #[test]
    fn test_protocol_log_unwritable() {
        let config = ClientConfig {
            protocol_log: Some(PathBuf::from("/nonexistent/dir/session")),
            ..ClientConfig::default()
        };
        let result = ClientEnvironment::new(config).with_protocol_log();
        assert!(matches!(result, Err(CvsError::Config(_))));
    }
}
