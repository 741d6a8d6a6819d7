//! Connections to a CVS server.
//!
//! A [`Connection`] is opened once per session, hands its byte streams to
//! [`ConnectionStreams`](crate::streaming::ConnectionStreams) and is closed
//! by it.

pub mod logger;
pub mod process;
pub mod pserver;
pub mod scripted;

use std::io::{self, Read, Write};

use crate::config::ClientConfig;
use crate::error::{CvsError, Result};
use crate::root::{CvsRoot, Method};

pub use logger::{ConnectionLogger, FileLogger, NoopLogger, TracingLogger};
pub use process::ProcessConnection;
pub use pserver::PServerConnection;
pub use scripted::{ScriptHandle, ScriptedConnection};

pub trait Connection: Send {
    /// Establish the connection. Every failure is reported as
    /// [`CvsError::Authentication`].
    fn open(&mut self, logger: &dyn ConnectionLogger) -> Result<()>;

    /// Server -> client bytes.
    fn input_stream(&mut self) -> io::Result<Box<dyn Read + Send>>;

    /// Client -> server bytes.
    fn output_stream(&mut self) -> io::Result<Box<dyn Write + Send>>;

    /// Repository path sent in the `Root` request.
    fn repository(&self) -> &str;

    fn close(&mut self) -> io::Result<()>;
}

/// Creates a fresh, unopened connection for each session.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Connection>>;
}

impl<F> ConnectionFactory for F
where
    F: Fn() -> Result<Box<dyn Connection>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn Connection>> {
        self()
    }
}

/// Builds connections from a CVSROOT and the client configuration.
#[derive(Debug, Clone)]
pub struct Connector {
    root: CvsRoot,
    config: ClientConfig,
}

impl Connector {
    pub fn new(root: CvsRoot, config: ClientConfig) -> Self {
        Self { root, config }
    }

    pub fn root(&self) -> &CvsRoot {
        &self.root
    }
}

impl ConnectionFactory for Connector {
    fn create(&self) -> Result<Box<dyn Connection>> {
        match self.root.method {
            Method::PServer => {
                let password = match &self.root.password {
                    Some(plain) => pserver::scramble(plain),
                    None => pserver::default_cvspass_path()
                        .and_then(|path| pserver::lookup_cvspass(&path, &self.root))
                        .unwrap_or_else(|| pserver::scramble("")),
                };
                Ok(Box::new(PServerConnection::new(
                    self.root.clone(),
                    password,
                    self.config.connect_timeout(),
                )))
            }
            Method::Ext => Ok(Box::new(ProcessConnection::ext(
                &self.root,
                &self.config.cvs_rsh,
                &self.config.cvs_server,
            )?)),
            Method::Fork => Ok(Box::new(ProcessConnection::fork(
                &self.root,
                &self.config.cvs_server,
            ))),
        }
    }
}

pub(crate) fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection is not open")
}

pub(crate) fn auth_error(message: impl std::fmt::Display) -> CvsError {
    CvsError::Authentication(message.to_string())
}
