//! Tee wrappers that report traffic to a [`ConnectionLogger`].

use crate::transport::ConnectionLogger;
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

/// Sits above a buffered reader and logs bytes as they are consumed, so
/// read-ahead that is never consumed is never logged.
pub struct LoggedReader<R> {
    inner: R,
    logger: Arc<dyn ConnectionLogger>,
}

impl<R: BufRead> LoggedReader<R> {
    pub fn new(inner: R, logger: Arc<dyn ConnectionLogger>) -> Self {
        Self { inner, logger }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> Read for LoggedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.logger.log_input(&buf[..n]);
        }
        Ok(n)
    }
}

impl<R: BufRead> BufRead for LoggedReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        // The bytes being consumed are still buffered, so this does no I/O
        if amt > 0 {
            if let Ok(available) = self.inner.fill_buf() {
                self.logger.log_input(&available[..amt.min(available.len())]);
            }
        }
        self.inner.consume(amt);
    }
}

pub struct LoggedWriter<W> {
    inner: W,
    logger: Arc<dyn ConnectionLogger>,
}

impl<W: Write> LoggedWriter<W> {
    pub fn new(inner: W, logger: Arc<dyn ConnectionLogger>) -> Self {
        Self { inner, logger }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LoggedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.logger.log_output(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        input: Mutex<Vec<u8>>,
        output: Mutex<Vec<u8>>,
    }

    impl ConnectionLogger for Recorder {
        fn log_input(&self, data: &[u8]) {
            self.input.lock().unwrap().extend_from_slice(data);
        }
        fn log_output(&self, data: &[u8]) {
            self.output.lock().unwrap().extend_from_slice(data);
        }
    }

    #[test]
    fn test_tee_does_not_alter_traffic() {
        let recorder = Arc::new(Recorder::default());

        let mut reader = LoggedReader::new(&b"ok\n"[..], recorder.clone());
        let mut read = String::new();
        reader.read_to_string(&mut read).unwrap();

        let mut writer = LoggedWriter::new(Vec::new(), recorder.clone());
        writer.write_all(b"noop\n").unwrap();

        assert_eq!(read, "ok\n");
        assert_eq!(writer.into_inner(), b"noop\n");
        assert_eq!(&*recorder.input.lock().unwrap(), b"ok\n");
        assert_eq!(&*recorder.output.lock().unwrap(), b"noop\n");
    }

    #[test]
    fn test_only_consumed_bytes_are_logged() {
        let recorder = Arc::new(Recorder::default());
        let mut reader = LoggedReader::new(BufReader::new(&b"ok\nrest"[..]), recorder.clone());

        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line).unwrap();

        assert_eq!(line, b"ok\n");
        assert_eq!(&*recorder.input.lock().unwrap(), b"ok\n");
        assert_eq!(reader.into_inner().buffer(), b"rest");
    }
}
