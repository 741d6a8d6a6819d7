//! Server -> client responses and the handler surface they are dispatched to.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;

// =============================================================================
// Response kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Ok,
    Error,
    ErrorMessage,
    FileMessage,
    Message,
    TaggedMessage,
    BinaryMessage,
    ValidRequests,
    CheckedIn,
    NewEntry,
    Checksum,
    CopyFile,
    Updated,
    Created,
    UpdateExisting,
    Merged,
    Patched,
    RcsDiff,
    Mode,
    ModTime,
    Removed,
    RemoveEntry,
    SetStaticDirectory,
    ClearStaticDirectory,
    SetSticky,
    ClearSticky,
    Template,
    SetCheckinProg,
    SetUpdateProg,
    Notified,
    ModuleExpansion,
    WrapperRcsOption,
}

impl ResponseKind {
    /// Every response this client understands, advertised in `Valid-responses`.
    pub const ALL: [ResponseKind; 32] = [
        ResponseKind::Ok,
        ResponseKind::Error,
        ResponseKind::ErrorMessage,
        ResponseKind::FileMessage,
        ResponseKind::Message,
        ResponseKind::TaggedMessage,
        ResponseKind::BinaryMessage,
        ResponseKind::ValidRequests,
        ResponseKind::CheckedIn,
        ResponseKind::NewEntry,
        ResponseKind::Checksum,
        ResponseKind::CopyFile,
        ResponseKind::Updated,
        ResponseKind::Created,
        ResponseKind::UpdateExisting,
        ResponseKind::Merged,
        ResponseKind::Patched,
        ResponseKind::RcsDiff,
        ResponseKind::Mode,
        ResponseKind::ModTime,
        ResponseKind::Removed,
        ResponseKind::RemoveEntry,
        ResponseKind::SetStaticDirectory,
        ResponseKind::ClearStaticDirectory,
        ResponseKind::SetSticky,
        ResponseKind::ClearSticky,
        ResponseKind::Template,
        ResponseKind::SetCheckinProg,
        ResponseKind::SetUpdateProg,
        ResponseKind::Notified,
        ResponseKind::ModuleExpansion,
        ResponseKind::WrapperRcsOption,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResponseKind::Ok => "ok",
            ResponseKind::Error => "error",
            ResponseKind::ErrorMessage => "E",
            ResponseKind::FileMessage => "F",
            ResponseKind::Message => "M",
            ResponseKind::TaggedMessage => "MT",
            ResponseKind::BinaryMessage => "Mbinary",
            ResponseKind::ValidRequests => "Valid-requests",
            ResponseKind::CheckedIn => "Checked-in",
            ResponseKind::NewEntry => "New-entry",
            ResponseKind::Checksum => "Checksum",
            ResponseKind::CopyFile => "Copy-file",
            ResponseKind::Updated => "Updated",
            ResponseKind::Created => "Created",
            ResponseKind::UpdateExisting => "Update-existing",
            ResponseKind::Merged => "Merged",
            ResponseKind::Patched => "Patched",
            ResponseKind::RcsDiff => "Rcs-diff",
            ResponseKind::Mode => "Mode",
            ResponseKind::ModTime => "Mod-time",
            ResponseKind::Removed => "Removed",
            ResponseKind::RemoveEntry => "Remove-entry",
            ResponseKind::SetStaticDirectory => "Set-static-directory",
            ResponseKind::ClearStaticDirectory => "Clear-static-directory",
            ResponseKind::SetSticky => "Set-sticky",
            ResponseKind::ClearSticky => "Clear-sticky",
            ResponseKind::Template => "Template",
            ResponseKind::SetCheckinProg => "Set-checkin-prog",
            ResponseKind::SetUpdateProg => "Set-update-prog",
            ResponseKind::Notified => "Notified",
            ResponseKind::ModuleExpansion => "Module-expansion",
            ResponseKind::WrapperRcsOption => "Wrapper-rcsOption",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// `error` and `E` count against the error circuit breaker.
    pub fn is_error(&self) -> bool {
        matches!(self, ResponseKind::Error | ResponseKind::ErrorMessage)
    }
}

// =============================================================================
// Response payloads
// =============================================================================

/// The `pathname` + repository line pair most file responses start with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPath {
    /// Local directory, relative to the working directory.
    pub local_directory: String,
    /// Full repository path of the file.
    pub repository_path: String,
}

impl EntryPath {
    /// Last component of the repository path.
    pub fn file_name(&self) -> &str {
        self.repository_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryUpdate {
    pub path: EntryPath,
    pub entry: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: EntryPath,
    pub entry: String,
    pub mode: String,
    pub content: Bytes,
}

// =============================================================================
// Handler surface
// =============================================================================

/// One method per response kind. Everything defaults to ignoring the
/// response so implementations override only what they consume.
pub trait ResponseHandler {
    fn ok(&mut self) -> Result<()> {
        Ok(())
    }

    fn error(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }

    fn error_message(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn file_message(&mut self) -> Result<()> {
        Ok(())
    }

    fn message(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn tagged_message(&mut self, _tag: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn binary_message(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn valid_requests(&mut self, _requests: &[String]) -> Result<()> {
        Ok(())
    }

    fn checked_in(&mut self, _update: &EntryUpdate) -> Result<()> {
        Ok(())
    }

    fn new_entry(&mut self, _update: &EntryUpdate) -> Result<()> {
        Ok(())
    }

    fn checksum(&mut self, _checksum: &str) -> Result<()> {
        Ok(())
    }

    fn copy_file(&mut self, _path: &EntryPath, _new_name: &str) -> Result<()> {
        Ok(())
    }

    fn updated(&mut self, _file: &FileUpdate) -> Result<()> {
        Ok(())
    }

    fn created(&mut self, _file: &FileUpdate) -> Result<()> {
        Ok(())
    }

    fn update_existing(&mut self, _file: &FileUpdate) -> Result<()> {
        Ok(())
    }

    fn merged(&mut self, _file: &FileUpdate) -> Result<()> {
        Ok(())
    }

    fn patched(&mut self, _file: &FileUpdate) -> Result<()> {
        Ok(())
    }

    fn rcs_diff(&mut self, _file: &FileUpdate) -> Result<()> {
        Ok(())
    }

    fn mode(&mut self, _mode: &str) -> Result<()> {
        Ok(())
    }

    fn mod_time(&mut self, _time: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    fn removed(&mut self, _path: &EntryPath) -> Result<()> {
        Ok(())
    }

    fn remove_entry(&mut self, _path: &EntryPath) -> Result<()> {
        Ok(())
    }

    fn set_static_directory(&mut self, _path: &EntryPath) -> Result<()> {
        Ok(())
    }

    fn clear_static_directory(&mut self, _path: &EntryPath) -> Result<()> {
        Ok(())
    }

    fn set_sticky(&mut self, _path: &EntryPath, _tag: &str) -> Result<()> {
        Ok(())
    }

    fn clear_sticky(&mut self, _path: &EntryPath) -> Result<()> {
        Ok(())
    }

    fn template(&mut self, _path: &EntryPath, _content: &[u8]) -> Result<()> {
        Ok(())
    }

    fn set_checkin_prog(&mut self, _directory: &str, _program: &str) -> Result<()> {
        Ok(())
    }

    fn set_update_prog(&mut self, _directory: &str, _program: &str) -> Result<()> {
        Ok(())
    }

    fn notified(&mut self, _path: &EntryPath) -> Result<()> {
        Ok(())
    }

    fn module_expansion(&mut self, _module: &str) -> Result<()> {
        Ok(())
    }

    fn wrapper_rcs_option(&mut self, _option: &str) -> Result<()> {
        Ok(())
    }
}

/// Collects `M`/`E` text, for commands whose output is plain messages.
#[derive(Debug, Default, Clone)]
pub struct MessageCollector {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    tagged_line: String,
}

impl ResponseHandler for MessageCollector {
    fn message(&mut self, text: &str) -> Result<()> {
        self.messages.push(text.to_string());
        Ok(())
    }

    fn tagged_message(&mut self, tag: &str, text: Option<&str>) -> Result<()> {
        // `+`/`-` group markers carry no text
        if tag == "newline" {
            self.messages.push(std::mem::take(&mut self.tagged_line));
        } else if let Some(text) = text {
            self.tagged_line.push_str(text);
        }
        Ok(())
    }

    fn error_message(&mut self, text: &str) -> Result<()> {
        self.errors.push(text.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        if !message.is_empty() {
            self.errors.push(message.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in ResponseKind::ALL {
            assert_eq!(ResponseKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ResponseKind::from_name("Bogus"), None);
    }

    #[test]
    fn test_error_classification() {
        let errors: Vec<_> = ResponseKind::ALL.iter().filter(|k| k.is_error()).collect();
        assert_eq!(errors, vec![&ResponseKind::Error, &ResponseKind::ErrorMessage]);
    }

    #[test]
    fn test_entry_path_file_name() {
        let path = EntryPath {
            local_directory: "src/".into(),
            repository_path: "/cvsroot/module/src/main.c".into(),
        };
        assert_eq!(path.file_name(), "main.c");
    }

    #[test]
    fn test_message_collector() {
        let mut collector = MessageCollector::default();
        collector.message("Concurrent Versions System (CVS) 1.12.13").unwrap();
        collector.tagged_message("text", Some("U ")).unwrap();
        collector.tagged_message("fname", Some("main.c")).unwrap();
        collector.tagged_message("newline", None).unwrap();
        collector.error_message("cvs server: warning").unwrap();

        assert_eq!(
            collector.messages,
            vec!["Concurrent Versions System (CVS) 1.12.13", "U main.c"]
        );
        assert_eq!(collector.errors, vec!["cvs server: warning"]);
    }
}
