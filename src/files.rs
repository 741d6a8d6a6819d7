//! Streaming local files to the server after `Modified`-style requests.
//!
//! A file body is its byte length on one line followed by exactly that many
//! bytes. Text files are sent with Unix line endings.

use std::fs;
use std::path::Path;

use tracing::trace;

use crate::error::Result;
use crate::streaming::ConnectionStreams;

pub trait LocalFileReader: Send + Sync {
    fn transmit_text_file(&self, path: &Path, streams: &mut ConnectionStreams) -> Result<()>;

    fn transmit_binary_file(&self, path: &Path, streams: &mut ConnectionStreams) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct StandardFileReader {
    /// Convert `\r\n` to `\n` in text files.
    pub convert_crlf: bool,
}

impl Default for StandardFileReader {
    fn default() -> Self {
        Self {
            convert_crlf: cfg!(windows),
        }
    }
}

impl StandardFileReader {
    fn transmit(&self, data: &[u8], streams: &mut ConnectionStreams) -> Result<()> {
        let mut writer = streams.writer();
        writer.write_line(&data.len().to_string())?;
        writer.write_bytes(data)?;
        Ok(())
    }
}

impl LocalFileReader for StandardFileReader {
    fn transmit_text_file(&self, path: &Path, streams: &mut ConnectionStreams) -> Result<()> {
        let data = fs::read(path)?;
        let data = if self.convert_crlf {
            unix_line_endings(&data)
        } else {
            data
        };
        trace!(path = %path.display(), size = data.len(), "Sending text file");
        self.transmit(&data, streams)
    }

    fn transmit_binary_file(&self, path: &Path, streams: &mut ConnectionStreams) -> Result<()> {
        let data = fs::read(path)?;
        trace!(path = %path.display(), size = data.len(), "Sending binary file");
        self.transmit(&data, streams)
    }
}

fn unix_line_endings(data: &[u8]) -> Vec<u8> {
    let mut converted = Vec::with_capacity(data.len());
    let mut bytes = data.iter().peekable();
    while let Some(&byte) = bytes.next() {
        if byte == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        converted.push(byte);
    }
    converted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::Charset;
    use crate::transport::{NoopLogger, ScriptedConnection};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn streams() -> (ConnectionStreams, crate::transport::ScriptHandle) {
        let (connection, handle) = ScriptedConnection::new(Vec::new());
        let streams =
            ConnectionStreams::open(Box::new(connection), Arc::new(NoopLogger), Charset::Ascii)
                .unwrap();
        (streams, handle)
    }

    #[test]
    fn test_text_file_with_length_prefix() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.c");
        fs::write(&path, "int x;\r\nint y;\n").unwrap();

        let (mut streams, handle) = streams();
        let reader = StandardFileReader { convert_crlf: true };
        reader.transmit_text_file(&path, &mut streams).unwrap();
        streams.flush_for_reading().unwrap();

        assert_eq!(handle.output(), b"14\nint x;\nint y;\n");
    }

    #[test]
    fn test_binary_file_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logo.bin");
        fs::write(&path, [0u8, 13, 10, 255]).unwrap();

        let (mut streams, handle) = streams();
        let reader = StandardFileReader { convert_crlf: true };
        reader.transmit_binary_file(&path, &mut streams).unwrap();
        streams.flush_for_reading().unwrap();

        assert_eq!(handle.output(), b"4\n\x00\r\n\xff");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let (mut streams, _handle) = streams();
        let err = StandardFileReader::default()
            .transmit_text_file(Path::new("/nonexistent/file"), &mut streams)
            .unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_lone_carriage_return_kept() {
        assert_eq!(unix_line_endings(b"a\rb\r\n"), b"a\rb\n");
    }
}
