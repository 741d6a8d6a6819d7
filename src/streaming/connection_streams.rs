//! The stream bundle owned by one session.
//!
//! Layering, bottom to top:
//!
//! ```text
//! connection byte streams
//!   -> pipe        (plain, or zlib after Gzip-stream)
//!   -> buffered    (BufReader / BufWriter)
//!   -> logged      (tee to the ConnectionLogger)
//!   -> text view   (TextReader / TextWriter, built per access with the current charset)
//! ```
//!
//! Switching compression replaces the pipes and rebuilds everything above
//! them. Switching the charset only changes the flag; text views built after
//! that use UTF-8.

use std::io::{self, BufReader, BufWriter, Write};
use std::mem;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::streaming::encoding::{make_reader, make_writer, Charset, TextReader, TextWriter};
use crate::streaming::logged::{LoggedReader, LoggedWriter};
use crate::streaming::pipe::{InputPipe, OutputPipe};
use crate::transport::{Connection, ConnectionLogger};

type BufferedInput = LoggedReader<BufReader<InputPipe>>;
type BufferedOutput = BufWriter<LoggedWriter<OutputPipe>>;

pub struct ConnectionStreams {
    connection: Box<dyn Connection>,
    logger: Arc<dyn ConnectionLogger>,
    input: BufferedInput,
    output: BufferedOutput,
    charset: Charset,
    closed: bool,
}

impl ConnectionStreams {
    /// Bind to an already opened connection.
    ///
    /// If the connection cannot hand out its streams it is closed before the
    /// error is returned.
    pub fn open(
        mut connection: Box<dyn Connection>,
        logger: Arc<dyn ConnectionLogger>,
        charset: Charset,
    ) -> Result<Self> {
        let streams = connection
            .input_stream()
            .and_then(|input| Ok((input, connection.output_stream()?)));
        let (input, output) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                if let Err(close_err) = connection.close() {
                    warn!("Failed to close connection: {}", close_err);
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            input: buffered_input(InputPipe::Plain(input), &logger),
            output: buffered_output(OutputPipe::Plain(output), &logger),
            connection,
            logger,
            charset,
            closed: false,
        })
    }

    pub fn reader(&mut self) -> TextReader<&mut BufferedInput> {
        make_reader(&mut self.input, self.charset)
    }

    pub fn writer(&mut self) -> TextWriter<&mut BufferedOutput> {
        make_writer(&mut self.output, self.charset)
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn is_gzipped(&self) -> bool {
        self.output.get_ref().get_ref().is_compressed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Push everything written so far to the server, terminating the
    /// compressed stream if one is active.
    pub fn flush_for_reading(&mut self) -> io::Result<()> {
        self.output.flush()?;
        self.output.get_mut().get_mut().finish()
    }

    /// Switch both directions to zlib at `level`.
    pub fn set_gzipped(&mut self, level: u32) -> io::Result<()> {
        if self.is_gzipped() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "compression is already active",
            ));
        }
        self.output.flush()?;

        let output = mem::replace(&mut self.output, buffered_output(OutputPipe::Detached, &self.logger));
        let output = output.into_inner().map_err(|e| e.into_error())?.into_inner();

        let input = mem::replace(&mut self.input, buffered_input(InputPipe::Detached, &self.logger));
        // Read-ahead was never consumed, so it was never logged either. The
        // new reader logs it once, inflated.
        let input = input.into_inner();
        let pending = input.buffer().to_vec();
        let input = input.into_inner();

        debug!(level, pending = pending.len(), "Switching connection to gzip-stream");
        self.rebuild(input.inflate(pending), output.deflate(level));
        Ok(())
    }

    /// Use UTF-8 for every text view built from now on.
    pub fn set_utf8(&mut self) {
        if !self.charset.is_utf8() {
            debug!("Switching connection text encoding to UTF-8");
            self.charset = Charset::Utf8;
        }
    }

    /// Close output, input and finally the connection. Failures are logged,
    /// never returned. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.close_output() {
            warn!("Failed to close output stream: {}", e);
        }
        drop(mem::replace(
            &mut self.input,
            buffered_input(InputPipe::Detached, &self.logger),
        ));
        if let Err(e) = self.connection.close() {
            warn!("Failed to close connection: {}", e);
        }
    }

    fn close_output(&mut self) -> io::Result<()> {
        let output = mem::replace(&mut self.output, buffered_output(OutputPipe::Detached, &self.logger));
        let mut pipe = output.into_inner().map_err(|e| e.into_error())?.into_inner();
        pipe.finish()
    }

    fn rebuild(&mut self, input: InputPipe, output: OutputPipe) {
        self.input = buffered_input(input, &self.logger);
        self.output = buffered_output(output, &self.logger);
    }
}

impl Drop for ConnectionStreams {
    fn drop(&mut self) {
        self.close();
    }
}

fn buffered_input(pipe: InputPipe, logger: &Arc<dyn ConnectionLogger>) -> BufferedInput {
    LoggedReader::new(BufReader::new(pipe), logger.clone())
}

fn buffered_output(pipe: OutputPipe, logger: &Arc<dyn ConnectionLogger>) -> BufferedOutput {
    BufWriter::new(LoggedWriter::new(pipe, logger.clone()))
}
