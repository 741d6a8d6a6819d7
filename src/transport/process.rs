//! Subprocess connections - `:ext:` (remote shell) and `:fork:` (local server).
//!
//! Provides the child's raw stdin/stdout. Protocol handling is done by
//! `ConnectionStreams`.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{auth_error, not_open, Connection, ConnectionLogger};
use crate::error::{CvsError, Result};
use crate::root::CvsRoot;

/// How long a server gets to exit after seeing EOF before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Manages a `cvs server` child process
pub struct ProcessConnection {
    program: OsString,
    args: Vec<OsString>,
    repository: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl ProcessConnection {
    /// `$CVS_RSH [-l user] host $CVS_SERVER server`
    pub fn ext(root: &CvsRoot, rsh: &str, server: &str) -> Result<Self> {
        let host = root
            .host
            .as_deref()
            .ok_or_else(|| CvsError::Config(format!("CVSROOT {} has no host", root)))?;

        let mut args: Vec<OsString> = Vec::new();
        if let Some(user) = &root.user {
            args.push("-l".into());
            args.push(user.into());
        }
        args.push(host.into());
        args.push(server.into());
        args.push("server".into());

        Ok(Self::with_command(rsh, args, &root.repository))
    }

    /// `$CVS_SERVER server` on this machine
    pub fn fork(root: &CvsRoot, server: &str) -> Self {
        Self::with_command(server, vec!["server".into()], &root.repository)
    }

    pub fn with_command(program: impl Into<OsString>, args: Vec<OsString>, repository: &str) -> Self {
        Self {
            program: program.into(),
            args,
            repository: repository.to_string(),
            child: None,
            stdin: None,
            stdout: None,
        }
    }

    /// Take ownership of a spawned server. A child without both pipes is
    /// killed and reaped before the error is returned.
    fn attach(&mut self, mut child: Child) -> Result<()> {
        match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => {
                self.stdin = Some(stdin);
                self.stdout = Some(stdout);
                self.child = Some(child);
                Ok(())
            }
            _ => {
                warn!(command = %self.command_line(), "Server process has no stdio pipes, killing it");
                if let Err(e) = child.kill() {
                    debug!(error = %e, "Server process already gone");
                }
                if let Err(e) = child.wait() {
                    warn!(error = %e, "Failed to reap server process");
                }
                Err(auth_error("server process has no stdio pipes"))
            }
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Connection for ProcessConnection {
    fn open(&mut self, _logger: &dyn ConnectionLogger) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        debug!(command = %self.command_line(), "Spawning CVS server process");
        let child = cmd
            .spawn()
            .map_err(|e| auth_error(format!("failed to start `{}`: {}", self.command_line(), e)))?;
        self.attach(child)
    }

    fn input_stream(&mut self) -> io::Result<Box<dyn Read + Send>> {
        let stdout = self.stdout.take().ok_or_else(not_open)?;
        Ok(Box::new(stdout))
    }

    fn output_stream(&mut self) -> io::Result<Box<dyn Write + Send>> {
        let stdin = self.stdin.take().ok_or_else(not_open)?;
        Ok(Box::new(stdin))
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping our ends of the pipes lets the server see EOF
        self.stdin = None;
        self.stdout = None;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + EXIT_GRACE;
        while child.try_wait()?.is_none() {
            if Instant::now() >= deadline {
                warn!(command = %self.command_line(), "Server process still running, killing it");
                child.kill()?;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        let status = child.wait()?;
        debug!(%status, "Server process exited");
        Ok(())
    }
}
