//! Client side of the CVS client/server protocol.
//!
//! A [`RequestProcessor`] runs one session per call: it opens a
//! [`Connection`](transport::Connection), negotiates the server's valid
//! requests, optionally switches the stream to zlib compression and UTF-8,
//! sends a batch of [`Requests`] and dispatches the replies to a
//! [`ResponseHandler`].
//!
//! ```no_run
//! use cvsclient::{ClientConfig, ClientEnvironment, CvsRoot, RequestProcessor};
//! use cvsclient::protocol::{Command, MessageCollector, Requests};
//! use cvsclient::session::NoProgress;
//! use cvsclient::transport::Connector;
//!
//! # fn main() -> cvsclient::Result<()> {
//! let root: CvsRoot = ":pserver:anonymous@cvs.example.org:/cvsroot".parse()?;
//! let config = ClientConfig::default();
//! let processor = RequestProcessor::new(
//!     Connector::new(root, config.clone()),
//!     ClientEnvironment::new(config),
//! );
//!
//! let mut output = MessageCollector::default();
//! let ok = processor.process_requests(&Requests::new(Command::Version), &mut output, &mut NoProgress)?;
//! println!("{} {:?}", ok, output.messages);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod files;
pub mod logging;
pub mod protocol;
pub mod root;
pub mod session;
pub mod streaming;
pub mod transport;

pub use config::ClientConfig;
pub use error::{CvsError, Result};
pub use protocol::{Request, Requests, ResponseHandler};
pub use root::CvsRoot;
pub use session::{ClientEnvironment, RequestProcessor};
pub use streaming::ConnectionStreams;
