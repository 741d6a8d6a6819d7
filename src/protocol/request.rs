//! Client -> server requests.

use std::fmt;
use std::path::PathBuf;

use crate::error::{CvsError, Result};
use crate::protocol::response::ResponseKind;

// =============================================================================
// Global options
// =============================================================================

bitflags::bitflags! {
    /// Options sent as `Global_option` before the command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GlobalOptions: u8 {
        const READ_ONLY = 1 << 0;
        const NO_CHANGES = 1 << 1;
        const NO_HISTORY_LOGGING = 1 << 2;
        const QUIET = 1 << 3;
    }
}

const GLOBAL_SWITCHES: [(GlobalOptions, &str); 4] = [
    (GlobalOptions::READ_ONLY, "-r"),
    (GlobalOptions::NO_CHANGES, "-n"),
    (GlobalOptions::NO_HISTORY_LOGGING, "-l"),
    (GlobalOptions::QUIET, "-q"),
];

impl GlobalOptions {
    /// Command line switches for the enabled options, in protocol order.
    pub fn switches(&self) -> impl Iterator<Item = &'static str> + '_ {
        GLOBAL_SWITCHES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, switch)| *switch)
    }
}

// =============================================================================
// File payloads
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitKind {
    Text,
    Binary,
}

/// A local file streamed right after its request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub path: PathBuf,
    pub kind: TransmitKind,
}

impl FilePayload {
    pub fn text(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: TransmitKind::Text,
        }
    }

    pub fn binary(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: TransmitKind::Binary,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Requests that make the server start replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Annotate,
    Checkout,
    Commit,
    Diff,
    ExpandModules,
    Log,
    Noop,
    Remove,
    Rlog,
    Rtag,
    Status,
    Tag,
    Update,
    Version,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Add => "add",
            Command::Annotate => "annotate",
            Command::Checkout => "co",
            Command::Commit => "ci",
            Command::Diff => "diff",
            Command::ExpandModules => "expand-modules",
            Command::Log => "log",
            Command::Noop => "noop",
            Command::Remove => "remove",
            Command::Rlog => "rlog",
            Command::Rtag => "rtag",
            Command::Status => "status",
            Command::Tag => "tag",
            Command::Update => "update",
            Command::Version => "version",
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Root(String),
    ValidResponses,
    ValidRequests,
    UseUnchanged,
    Set { name: String, value: String },
    GzipStream(u32),
    /// One switch from [`GlobalOptions::switches`]
    GlobalOption(&'static str),
    Case,
    Directory { local: String, repository: String },
    StaticDirectory,
    Sticky(String),
    Entry(String),
    Modified {
        name: String,
        mode: String,
        payload: FilePayload,
    },
    IsModified(String),
    Unchanged(String),
    Questionable(String),
    Argument(String),
    Argumentx(String),
    Command(Command),
}

impl Request {
    /// Protocol name, as listed in the server's `Valid-requests`.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Root(_) => "Root",
            Request::ValidResponses => "Valid-responses",
            Request::ValidRequests => "valid-requests",
            Request::UseUnchanged => "UseUnchanged",
            Request::Set { .. } => "Set",
            Request::GzipStream(_) => "Gzip-stream",
            Request::GlobalOption(_) => "Global_option",
            Request::Case => "Case",
            Request::Directory { .. } => "Directory",
            Request::StaticDirectory => "Static-directory",
            Request::Sticky(_) => "Sticky",
            Request::Entry(_) => "Entry",
            Request::Modified { .. } => "Modified",
            Request::IsModified(_) => "Is-modified",
            Request::Unchanged(_) => "Unchanged",
            Request::Questionable(_) => "Questionable",
            Request::Argument(_) => "Argument",
            Request::Argumentx(_) => "Argumentx",
            Request::Command(cmd) => cmd.name(),
        }
    }

    /// The request text without the final newline. Multi-line requests
    /// contain embedded newlines.
    pub fn line(&self) -> String {
        let name = self.name();
        match self {
            Request::ValidResponses => {
                let mut line = name.to_string();
                for kind in ResponseKind::ALL {
                    line.push(' ');
                    line.push_str(kind.name());
                }
                line
            }
            Request::ValidRequests
            | Request::UseUnchanged
            | Request::Case
            | Request::StaticDirectory
            | Request::Command(_) => name.to_string(),
            Request::Root(value)
            | Request::Sticky(value)
            | Request::Entry(value)
            | Request::IsModified(value)
            | Request::Unchanged(value)
            | Request::Questionable(value)
            | Request::Argument(value)
            | Request::Argumentx(value) => format!("{} {}", name, value),
            Request::GlobalOption(switch) => format!("{} {}", name, switch),
            Request::Set { name: var, value } => format!("{} {}={}", name, var, value),
            Request::GzipStream(level) => format!("{} {}", name, level),
            Request::Directory { local, repository } => {
                format!("{} {}\n{}", name, local, repository)
            }
            Request::Modified {
                name: file, mode, ..
            } => format!("{} {}\n{}", name, file, mode),
        }
    }

    /// Every value is written as a single protocol line, so none may
    /// contain a newline. Multi-line arguments go through
    /// [`Request::arguments`].
    pub fn validate(&self) -> Result<()> {
        let values: Vec<&str> = match self {
            Request::Root(value)
            | Request::Sticky(value)
            | Request::Entry(value)
            | Request::IsModified(value)
            | Request::Unchanged(value)
            | Request::Questionable(value)
            | Request::Argument(value)
            | Request::Argumentx(value) => vec![value.as_str()],
            Request::Set { name, value } => vec![name.as_str(), value.as_str()],
            Request::Directory { local, repository } => vec![local.as_str(), repository.as_str()],
            Request::Modified { name, mode, .. } => vec![name.as_str(), mode.as_str()],
            _ => Vec::new(),
        };
        match values.iter().find(|value| value.contains('\n')) {
            Some(value) => Err(CvsError::protocol(format!(
                "{} value {:?} contains a newline",
                self.name(),
                value
            ))),
            None => Ok(()),
        }
    }

    pub fn file_payload(&self) -> Option<&FilePayload> {
        match self {
            Request::Modified { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn is_response_expected(&self) -> bool {
        matches!(self, Request::Command(_))
    }

    /// `Argument` for the first line of `text`, `Argumentx` for the rest.
    pub fn arguments(text: &str) -> Vec<Request> {
        text.split('\n')
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    Request::Argument(line.to_string())
                } else {
                    Request::Argumentx(line.to_string())
                }
            })
            .collect()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line())
    }
}

/// An ordered batch of requests ending in one response-expecting command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requests {
    requests: Vec<Request>,
    terminal: Request,
}

impl Requests {
    pub fn new(command: Command) -> Self {
        Self {
            requests: Vec::new(),
            terminal: Request::Command(command),
        }
    }

    pub fn push(&mut self, request: Request) -> &mut Self {
        self.requests.push(request);
        self
    }

    pub fn with(mut self, request: Request) -> Self {
        self.requests.push(request);
        self
    }

    pub fn extend(&mut self, requests: impl IntoIterator<Item = Request>) -> &mut Self {
        self.requests.extend(requests);
        self
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// The request that makes the server reply.
    pub fn response_expecting(&self) -> &Request {
        &self.terminal
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_lines() {
        assert_eq!(Request::Root("/cvsroot".into()).line(), "Root /cvsroot");
        assert_eq!(
            Request::Set {
                name: "EDITOR".into(),
                value: "true".into()
            }
            .line(),
            "Set EDITOR=true"
        );
        assert_eq!(Request::GzipStream(6).line(), "Gzip-stream 6");
        assert_eq!(
            Request::Directory {
                local: ".".into(),
                repository: "/cvsroot/module".into()
            }
            .line(),
            "Directory .\n/cvsroot/module"
        );
        assert_eq!(Request::Command(Command::Checkout).line(), "co");
    }

    #[test]
    fn test_newline_in_value_is_rejected() {
        assert!(Request::Argument("-m".into()).validate().is_ok());
        assert!(Request::Command(Command::Update).validate().is_ok());

        let injected = Request::Argument("x\nversion".into());
        assert!(matches!(injected.validate(), Err(CvsError::Protocol(_))));
        let injected = Request::Set {
            name: "EDITOR".into(),
            value: "vi\nRoot /tmp".into(),
        };
        assert!(injected.validate().is_err());
        let injected = Request::Directory {
            local: ".".into(),
            repository: "/cvsroot\n/other".into(),
        };
        assert!(injected.validate().is_err());

        for request in Request::arguments("first\nsecond") {
            assert!(request.validate().is_ok());
        }
    }

    #[test]
    fn test_valid_responses_lists_every_kind() {
        let line = Request::ValidResponses.line();
        assert!(line.starts_with("Valid-responses ok error "));
        assert_eq!(line.split(' ').count(), ResponseKind::ALL.len() + 1);
    }

    #[test]
    fn test_modified_carries_payload() {
        let request = Request::Modified {
            name: "main.c".into(),
            mode: "u=rw,g=r,o=r".into(),
            payload: FilePayload::text("/work/main.c"),
        };
        assert_eq!(request.line(), "Modified main.c\nu=rw,g=r,o=r");
        assert_eq!(request.file_payload().unwrap().kind, TransmitKind::Text);
        assert!(!request.is_response_expected());
    }

    #[test]
    fn test_multiline_arguments() {
        let args = Request::arguments("first\nsecond");
        assert_eq!(
            args,
            vec![
                Request::Argument("first".into()),
                Request::Argumentx("second".into())
            ]
        );
    }

    #[test]
    fn test_global_option_switches() {
        let options = GlobalOptions::QUIET | GlobalOptions::READ_ONLY;
        assert_eq!(options.switches().collect::<Vec<_>>(), vec!["-r", "-q"]);
        assert_eq!(GlobalOptions::empty().switches().count(), 0);
    }

    #[test]
    fn test_requests_batch() {
        let requests = Requests::new(Command::Update)
            .with(Request::Argument("-d".into()))
            .with(Request::Directory {
                local: ".".into(),
                repository: "/cvsroot/m".into(),
            });
        assert_eq!(requests.len(), 2);
        assert!(requests.response_expecting().is_response_expected());
        assert_eq!(requests.response_expecting().line(), "update");
    }
}
