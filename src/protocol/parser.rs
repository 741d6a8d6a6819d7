//! Turns response tokens into handler calls.
//!
//! The dispatch loop reads the response name; the parser reads whatever
//! lines and file contents belong to that response and reports whether the
//! session is finished.

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{CvsError, Result};
use crate::protocol::response::{
    EntryPath, EntryUpdate, FileUpdate, ResponseHandler, ResponseKind,
};
use crate::session::ClientEnvironment;
use crate::streaming::{ConnectionStreams, ResponseToken};

/// Upper bound on a single file body, to reject corrupt size lines early.
pub const MAX_FILE_SIZE: u64 = 1 << 32;

pub trait ResponseParser: Send + Sync {
    /// Consume the response introduced by `token`.
    ///
    /// `Some(true)` / `Some(false)` end the session with success / failure;
    /// `None` means more responses follow.
    fn process_response(
        &self,
        token: &ResponseToken,
        streams: &mut ConnectionStreams,
        handler: &mut dyn ResponseHandler,
        environment: &ClientEnvironment,
    ) -> Result<Option<bool>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResponseParser;

impl ResponseParser for DefaultResponseParser {
    fn process_response(
        &self,
        token: &ResponseToken,
        streams: &mut ConnectionStreams,
        handler: &mut dyn ResponseHandler,
        _environment: &ClientEnvironment,
    ) -> Result<Option<bool>> {
        let kind = ResponseKind::from_name(&token.text)
            .ok_or_else(|| CvsError::protocol(format!("unexpected response: {}", token.text)))?;
        let mut input = ResponseInput { token, streams };

        match kind {
            ResponseKind::Ok => {
                input.rest_of_line()?;
                handler.ok()?;
                return Ok(Some(true));
            }
            ResponseKind::Error => {
                let message = error_text(&input.rest_of_line()?);
                handler.error(&message)?;
                return Ok(Some(false));
            }
            ResponseKind::ErrorMessage => handler.error_message(&input.rest_of_line()?)?,
            ResponseKind::FileMessage => {
                input.rest_of_line()?;
                handler.file_message()?
            }
            ResponseKind::Message => handler.message(&input.rest_of_line()?)?,
            ResponseKind::TaggedMessage => {
                let rest = input.rest_of_line()?;
                let (tag, text) = match rest.split_once(' ') {
                    Some((tag, text)) => (tag, Some(text)),
                    None => (rest.as_str(), None),
                };
                handler.tagged_message(tag, text)?
            }
            ResponseKind::BinaryMessage => {
                input.rest_of_line()?;
                let data = input.sized_content()?;
                handler.binary_message(&data)?
            }
            ResponseKind::ValidRequests => {
                let requests: Vec<String> = input
                    .rest_of_line()?
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                handler.valid_requests(&requests)?
            }
            ResponseKind::CheckedIn => handler.checked_in(&input.entry_update()?)?,
            ResponseKind::NewEntry => handler.new_entry(&input.entry_update()?)?,
            ResponseKind::Checksum => handler.checksum(&input.rest_of_line()?)?,
            ResponseKind::CopyFile => {
                let path = input.entry_path()?;
                let new_name = input.line()?;
                handler.copy_file(&path, &new_name)?
            }
            ResponseKind::Updated => handler.updated(&input.file_update()?)?,
            ResponseKind::Created => handler.created(&input.file_update()?)?,
            ResponseKind::UpdateExisting => handler.update_existing(&input.file_update()?)?,
            ResponseKind::Merged => handler.merged(&input.file_update()?)?,
            ResponseKind::Patched => handler.patched(&input.file_update()?)?,
            ResponseKind::RcsDiff => handler.rcs_diff(&input.file_update()?)?,
            ResponseKind::Mode => handler.mode(&input.rest_of_line()?)?,
            ResponseKind::ModTime => handler.mod_time(parse_mod_time(&input.rest_of_line()?)?)?,
            ResponseKind::Removed => handler.removed(&input.entry_path()?)?,
            ResponseKind::RemoveEntry => handler.remove_entry(&input.entry_path()?)?,
            ResponseKind::SetStaticDirectory => {
                handler.set_static_directory(&input.entry_path()?)?
            }
            ResponseKind::ClearStaticDirectory => {
                handler.clear_static_directory(&input.entry_path()?)?
            }
            ResponseKind::SetSticky => {
                let path = input.entry_path()?;
                let tag = input.line()?;
                handler.set_sticky(&path, &tag)?
            }
            ResponseKind::ClearSticky => handler.clear_sticky(&input.entry_path()?)?,
            ResponseKind::Template => {
                let path = input.entry_path()?;
                let content = input.sized_content()?;
                handler.template(&path, &content)?
            }
            ResponseKind::SetCheckinProg => {
                let directory = input.rest_of_line()?;
                let program = input.line()?;
                handler.set_checkin_prog(&directory, &program)?
            }
            ResponseKind::SetUpdateProg => {
                let directory = input.rest_of_line()?;
                let program = input.line()?;
                handler.set_update_prog(&directory, &program)?
            }
            ResponseKind::Notified => handler.notified(&input.entry_path()?)?,
            ResponseKind::ModuleExpansion => handler.module_expansion(&input.rest_of_line()?)?,
            ResponseKind::WrapperRcsOption => handler.wrapper_rcs_option(&input.rest_of_line()?)?,
        }
        Ok(None)
    }
}

/// Reads the remainder of one response.
struct ResponseInput<'a> {
    token: &'a ResponseToken,
    streams: &'a mut ConnectionStreams,
}

impl ResponseInput<'_> {
    /// Text after the response name on the same line.
    fn rest_of_line(&mut self) -> Result<String> {
        if self.token.ends_line() {
            return Ok(String::new());
        }
        self.line()
    }

    fn line(&mut self) -> Result<String> {
        self.streams
            .reader()
            .read_line()?
            .ok_or_else(|| unexpected_eof(&self.token.text))
    }

    fn entry_path(&mut self) -> Result<EntryPath> {
        Ok(EntryPath {
            local_directory: self.rest_of_line()?,
            repository_path: self.line()?,
        })
    }

    fn entry_update(&mut self) -> Result<EntryUpdate> {
        Ok(EntryUpdate {
            path: self.entry_path()?,
            entry: self.line()?,
        })
    }

    fn file_update(&mut self) -> Result<FileUpdate> {
        let path = self.entry_path()?;
        let entry = self.line()?;
        let mode = self.line()?;
        let content = self.sized_content()?;
        Ok(FileUpdate {
            path,
            entry,
            mode,
            content,
        })
    }

    /// A `<size>\n<bytes>` body.
    fn sized_content(&mut self) -> Result<Bytes> {
        let size_line = self.line()?;
        if size_line.starts_with('z') {
            return Err(CvsError::protocol(format!(
                "{}: per-file compression was not requested",
                self.token.text
            )));
        }
        let size: u64 = size_line.trim().parse().map_err(|_| {
            CvsError::protocol(format!("{}: invalid file size {:?}", self.token.text, size_line))
        })?;
        if size > MAX_FILE_SIZE {
            return Err(CvsError::protocol(format!(
                "{}: file size {} exceeds limit",
                self.token.text, size
            )));
        }
        let len = usize::try_from(size).map_err(|_| {
            CvsError::protocol(format!(
                "{}: file size {} does not fit in memory",
                self.token.text, size
            ))
        })?;
        let data = self.streams.reader().read_bytes(len)?;
        if data.len() < len {
            return Err(unexpected_eof(&self.token.text));
        }
        Ok(Bytes::from(data))
    }
}

fn unexpected_eof(response: &str) -> CvsError {
    CvsError::protocol(format!("unexpected end of stream inside {} response", response))
}

/// `error` carries an optional errno before the message.
fn error_text(rest: &str) -> String {
    let rest = rest.trim_start();
    match rest.split_once(' ') {
        Some((code, message)) if code.chars().all(|c| c.is_ascii_digit()) => {
            message.trim().to_string()
        }
        _ if rest.chars().all(|c| c.is_ascii_digit()) => String::new(),
        _ => rest.trim().to_string(),
    }
}

/// `Mod-time` uses RFC 822 dates without the weekday, e.g.
/// `2 Jun 2003 10:20:30 -0000`. Some servers write `GMT` instead of an offset.
pub fn parse_mod_time(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_str(text, "%d %b %Y %H:%M:%S %z") {
        return Ok(time.with_timezone(&Utc));
    }
    if let Some(naive) = text.strip_suffix(" GMT") {
        if let Ok(time) = NaiveDateTime::parse_from_str(naive, "%d %b %Y %H:%M:%S") {
            return Ok(time.and_utc());
        }
    }
    Err(CvsError::protocol(format!("invalid Mod-time: {}", text)))
}
