//! Client configuration.
//!
//! Loaded from a TOML file, then overlaid with the conventional CVS
//! environment variables (`CVSROOT`, `CVS_RSH`, `CVS_SERVER`).
//!
//! ```toml
//! cvsroot = ":pserver:anon@cvs.example.org:/cvsroot"
//! gzip_level = 6
//! charset = "utf-8"
//! quiet = true
//! error_timeout_secs = 60
//!
//! [environment]
//! EDITOR = "true"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CvsError, Result};
use crate::protocol::GlobalOptions;
use crate::streaming::Charset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub cvsroot: Option<String>,

    /// zlib level for `Gzip-stream`; `None` disables compression
    pub gzip_level: Option<u32>,

    pub charset: Charset,

    /// `-r`: check out files read-only
    pub read_only: bool,
    /// `-n`: do not change anything on disk or in the repository
    pub dry_run: bool,
    /// `-l`: do not log the command in the history file
    pub no_history: bool,
    /// `-q`: suppress informational messages
    pub quiet: bool,

    /// Sent to the server as `Set name=value`
    pub environment: BTreeMap<String, String>,

    /// Abort response dispatch once errors have been arriving for this long.
    /// 0 disables the time limit.
    pub error_timeout_secs: u64,

    /// Prefix for `.in`/`.out` protocol logs
    pub protocol_log: Option<PathBuf>,

    pub cvs_rsh: String,
    pub cvs_server: String,
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cvsroot: None,
            gzip_level: None,
            charset: Charset::Ascii,
            read_only: false,
            dry_run: false,
            no_history: false,
            quiet: false,
            environment: BTreeMap::new(),
            error_timeout_secs: 0,
            protocol_log: None,
            cvs_rsh: "ssh".to_string(),
            cvs_server: "cvs".to_string(),
            connect_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CvsError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Loaded client configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CvsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.gzip_level {
            if !(1..=9).contains(&level) {
                return Err(CvsError::Config(format!(
                    "gzip_level must be between 1 and 9, got {}",
                    level
                )));
            }
        }
        if let Some(name) = self.environment.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(CvsError::Config(format!(
                "Invalid environment variable name: {:?}",
                name
            )));
        }
        Ok(())
    }

    /// Apply `CVSROOT`, `CVS_RSH` and `CVS_SERVER` from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("CVSROOT") {
            if !root.is_empty() {
                self.cvsroot = Some(root);
            }
        }
        if let Ok(rsh) = std::env::var("CVS_RSH") {
            if !rsh.is_empty() {
                self.cvs_rsh = rsh;
            }
        }
        if let Ok(server) = std::env::var("CVS_SERVER") {
            if !server.is_empty() {
                self.cvs_server = server;
            }
        }
    }

    pub fn global_options(&self) -> GlobalOptions {
        let mut options = GlobalOptions::empty();
        options.set(GlobalOptions::READ_ONLY, self.read_only);
        options.set(GlobalOptions::NO_CHANGES, self.dry_run);
        options.set(GlobalOptions::NO_HISTORY_LOGGING, self.no_history);
        options.set(GlobalOptions::QUIET, self.quiet);
        options
    }

    pub fn error_timeout(&self) -> Duration {
        Duration::from_secs(self.error_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}
