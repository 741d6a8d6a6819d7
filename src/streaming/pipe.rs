//! Byte pipes under the logged views: the connection's own streams, or the
//! same streams wrapped in zlib deflate/inflate after `Gzip-stream`.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

pub type RawInput = Box<dyn Read + Send>;
pub type RawOutput = Box<dyn Write + Send>;

pub enum InputPipe {
    Plain(RawInput),
    Inflate(ZlibDecoder<RawInput>),
    Detached,
}

impl InputPipe {
    /// Wrap the current pipe in a decompressor. `pending` holds bytes that
    /// were read ahead from this pipe but not yet consumed; they belong to
    /// the compressed stream and are replayed ahead of it.
    pub fn inflate(self, pending: Vec<u8>) -> Self {
        let inner: RawInput = if pending.is_empty() {
            Box::new(self)
        } else {
            Box::new(io::Cursor::new(pending).chain(self))
        };
        InputPipe::Inflate(ZlibDecoder::new(inner))
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, InputPipe::Inflate(_))
    }
}

impl Read for InputPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputPipe::Plain(r) => r.read(buf),
            InputPipe::Inflate(r) => r.read(buf),
            InputPipe::Detached => Err(detached()),
        }
    }
}

pub enum OutputPipe {
    Plain(RawOutput),
    Deflate {
        encoder: ZlibEncoder<RawOutput>,
        finished: bool,
    },
    Detached,
}

impl OutputPipe {
    pub fn deflate(self, level: u32) -> Self {
        OutputPipe::Deflate {
            encoder: ZlibEncoder::new(Box::new(self), Compression::new(level)),
            finished: false,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, OutputPipe::Deflate { .. })
    }

    /// Write out everything the compressor holds, including the stream
    /// trailer, so the peer can decode a complete stream.
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            OutputPipe::Deflate { encoder, finished } => {
                if !*finished {
                    encoder.try_finish()?;
                    *finished = true;
                }
                encoder.get_mut().flush()
            }
            OutputPipe::Plain(w) => w.flush(),
            OutputPipe::Detached => Ok(()),
        }
    }
}

impl Write for OutputPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputPipe::Plain(w) => w.write(buf),
            OutputPipe::Deflate { finished: true, .. } => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "compressed stream already finished",
            )),
            OutputPipe::Deflate { encoder, .. } => encoder.write(buf),
            OutputPipe::Detached => Err(detached()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputPipe::Plain(w) => w.flush(),
            OutputPipe::Deflate { encoder, finished } => {
                if *finished {
                    encoder.get_mut().flush()
                } else {
                    encoder.flush()
                }
            }
            OutputPipe::Detached => Ok(()),
        }
    }
}

fn detached() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection streams are closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_deflate_then_inflate() {
        let sink = Shared::default();
        let mut out = OutputPipe::Plain(Box::new(sink.clone())).deflate(6);
        out.write_all(b"Argument -l\nlog\n").unwrap();
        out.finish().unwrap();
        assert!(out.write(b"more").is_err());

        let wire = sink.0.lock().unwrap().clone();
        let mut input = InputPipe::Plain(Box::new(io::Cursor::new(wire))).inflate(Vec::new());
        let mut text = String::new();
        input.read_to_string(&mut text).unwrap();
        assert_eq!(text, "Argument -l\nlog\n");
    }

    #[test]
    fn test_inflate_replays_pending_bytes() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"ok\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let (head, tail) = compressed.split_at(4);
        let mut input =
            InputPipe::Plain(Box::new(io::Cursor::new(tail.to_vec()))).inflate(head.to_vec());
        let mut text = String::new();
        input.read_to_string(&mut text).unwrap();
        assert_eq!(text, "ok\n");
    }

    #[test]
    fn test_detached_pipes_refuse_io() {
        let mut input = InputPipe::Detached;
        let mut buf = [0u8; 4];
        assert_eq!(
            input.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert!(OutputPipe::Detached.write(b"x").is_err());
    }
}
