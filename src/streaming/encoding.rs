//! Text views over the connection's byte streams.
//!
//! The protocol is line oriented, so the reader works on raw bytes up to a
//! delimiter and only then decodes. ASCII and UTF-8 agree on every 7-bit
//! byte; they diverge only for non-ASCII content, where ASCII decoding yields
//! U+FFFD and ASCII encoding yields `?`.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, BufRead, Read, Write};

/// Text codec negotiated for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Charset {
    #[default]
    #[serde(rename = "ascii", alias = "us-ascii")]
    Ascii,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

impl Charset {
    pub fn is_utf8(&self) -> bool {
        matches!(self, Charset::Utf8)
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                .collect(),
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        match self {
            Charset::Utf8 => Cow::Borrowed(text.as_bytes()),
            Charset::Ascii if text.is_ascii() => Cow::Borrowed(text.as_bytes()),
            Charset::Ascii => Cow::Owned(
                text.chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                    .collect(),
            ),
        }
    }
}

/// Build a decoding reader over a buffered byte input.
pub fn make_reader<R: BufRead>(input: R, charset: Charset) -> TextReader<R> {
    TextReader { input, charset }
}

/// Build an encoding writer over a byte output.
pub fn make_writer<W: Write>(output: W, charset: Charset) -> TextWriter<W> {
    TextWriter { output, charset }
}

// =============================================================================
// Tokens
// =============================================================================

/// What ended a response token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Space,
    Newline,
    Eof,
}

/// One space/newline delimited unit of the reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseToken {
    pub text: String,
    pub terminator: Terminator,
}

impl ResponseToken {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when nothing else follows the token on its line.
    pub fn ends_line(&self) -> bool {
        !matches!(self.terminator, Terminator::Space)
    }
}

// =============================================================================
// Reader
// =============================================================================

pub struct TextReader<R> {
    input: R,
    charset: Charset,
}

impl<R: BufRead> TextReader<R> {
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Read up to the next space or newline. The delimiter is consumed.
    pub fn read_token(&mut self) -> io::Result<ResponseToken> {
        let mut raw = Vec::new();
        let terminator = loop {
            let available = self.input.fill_buf()?;
            if available.is_empty() {
                break Terminator::Eof;
            }
            match available.iter().position(|&b| b == b' ' || b == b'\n') {
                Some(pos) => {
                    let terminator = if available[pos] == b' ' {
                        Terminator::Space
                    } else {
                        Terminator::Newline
                    };
                    raw.extend_from_slice(&available[..pos]);
                    self.input.consume(pos + 1);
                    break terminator;
                }
                None => {
                    let len = available.len();
                    raw.extend_from_slice(available);
                    self.input.consume(len);
                }
            }
        };

        Ok(ResponseToken {
            text: self.charset.decode(&raw),
            terminator,
        })
    }

    /// Read one line without its newline. `None` at end of stream.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut raw = Vec::new();
        let n = self.input.read_until(b'\n', &mut raw)?;
        if n == 0 {
            return Ok(None);
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        Ok(Some(self.charset.decode(&raw)))
    }

    /// Read up to `len` undecoded bytes (file contents). The buffer grows as
    /// bytes arrive and comes back short only at end of stream.
    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.input).take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

// =============================================================================
// Writer
// =============================================================================

pub struct TextWriter<W> {
    output: W,
    charset: Charset,
}

impl<W: Write> TextWriter<W> {
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.output.write_all(&self.charset.encode(line))?;
        self.output.write_all(b"\n")
    }

    /// Write undecoded bytes (file contents).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.write_all(bytes)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_read_tokens_and_terminators() {
        let mut reader = make_reader(Cursor::new(b"E file not\nok\n".to_vec()), Charset::Ascii);

        let t = reader.read_token().unwrap();
        assert_eq!(t.text, "E");
        assert_eq!(t.terminator, Terminator::Space);
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("file not"));

        let t = reader.read_token().unwrap();
        assert_eq!(t.text, "ok");
        assert!(t.ends_line());

        let t = reader.read_token().unwrap();
        assert!(t.is_empty());
        assert_eq!(t.terminator, Terminator::Eof);
    }

    #[test]
    fn test_token_spanning_buffer_refills() {
        let input = std::io::BufReader::with_capacity(2, Cursor::new(b"Valid-requests Root\n".to_vec()));
        let mut reader = make_reader(input, Charset::Ascii);
        assert_eq!(reader.read_token().unwrap().text, "Valid-requests");
        assert_eq!(reader.read_token().unwrap().text, "Root");
    }

    #[test]
    fn test_read_bytes_after_line() {
        let mut reader = make_reader(Cursor::new(b"3\nabcok\n".to_vec()), Charset::Ascii);
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("3"));
        assert_eq!(reader.read_bytes(3).unwrap(), b"abc");
        assert_eq!(reader.read_token().unwrap().text, "ok");
    }

    #[test]
    fn test_read_bytes_stops_at_eof() {
        let mut reader = make_reader(Cursor::new(b"abc".to_vec()), Charset::Ascii);
        assert_eq!(reader.read_bytes(usize::MAX).unwrap(), b"abc");
        assert!(reader.read_bytes(1).unwrap().is_empty());
    }

    #[test]
    fn test_codecs_diverge_on_non_ascii() {
        let bytes = "caf\u{e9}".as_bytes();
        assert_eq!(Charset::Utf8.decode(bytes), "caf\u{e9}");
        assert_eq!(Charset::Ascii.decode(bytes), "caf\u{FFFD}\u{FFFD}");

        assert_eq!(Charset::Ascii.encode("caf\u{e9}").as_ref(), b"caf?");
        assert_eq!(Charset::Utf8.encode("caf\u{e9}").as_ref(), bytes);
    }

    #[test]
    fn test_writer_appends_newline() {
        let mut writer = make_writer(Vec::new(), Charset::Ascii);
        writer.write_line("Root /cvsroot").unwrap();
        writer.write_bytes(b"raw").unwrap();
        assert_eq!(writer.into_inner(), b"Root /cvsroot\nraw");
    }

    proptest! {
        #[test]
        fn prop_ascii_line_roundtrip(line in "[\\x00-\\x09\\x0b-\\x7f]*") {
            let mut writer = make_writer(Vec::new(), Charset::Ascii);
            writer.write_line(&line).unwrap();
            let bytes = writer.into_inner();

            let mut reader = make_reader(Cursor::new(bytes), Charset::Ascii);
            prop_assert_eq!(reader.read_line().unwrap(), Some(line));
        }
    }
}
