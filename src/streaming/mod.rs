//! Byte and text streams layered over a connection.
//!
//! # Architecture
//!
//! ```text
//! Connection --> pipe (plain | zlib) --> logged tee --> buffer --> TextReader / TextWriter
//!                                            |
//!                                            +--> ConnectionLogger
//! ```
//!
//! [`ConnectionStreams`] owns the whole stack for one session and can switch
//! it to zlib compression or UTF-8 text once the session is under way.

pub mod connection_streams;
pub mod encoding;
pub mod logged;
pub mod pipe;

pub use connection_streams::ConnectionStreams;
pub use encoding::{
    make_reader, make_writer, Charset, ResponseToken, Terminator, TextReader, TextWriter,
};
pub use logged::{LoggedReader, LoggedWriter};
pub use pipe::{InputPipe, OutputPipe};
