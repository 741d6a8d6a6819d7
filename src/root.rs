//! CVSROOT parsing.
//!
//! Accepted forms:
//!
//! - `:pserver:[user[:password]@]host[:[port]]/path`
//! - `:ext:[user@]host[:]/path`
//! - `:fork:/path` and `:local:/path`
//! - `[user@]host:/path` (implies `ext`)
//! - `/path` (implies `fork`)

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{CvsError, Result};

/// Port used by `:pserver:` when the root does not name one.
pub const DEFAULT_PSERVER_PORT: u16 = 2401;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    PServer,
    Ext,
    Fork,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::PServer => "pserver",
            Method::Ext => "ext",
            Method::Fork => "fork",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pserver" => Some(Method::PServer),
            "ext" | "server" => Some(Method::Ext),
            "fork" | "local" => Some(Method::Fork),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvsRoot {
    pub method: Method,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub repository: String,
}

fn explicit_method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^:(?P<method>[A-Za-z]+):(?:(?P<user>[^@:/]+)(?::(?P<password>[^@]*))?@)?(?:(?P<host>[^:/@]+):?(?P<port>\d+)?)?(?P<path>/.*)$",
        )
        .expect("CVSROOT pattern is valid")
    })
}

fn implicit_ext_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?P<user>[^@:/]+)@)?(?P<host>[^:/@]+):(?P<path>/.*)$")
            .expect("CVSROOT pattern is valid")
    })
}

impl CvsRoot {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = || CvsError::Config(format!("Invalid CVSROOT: {}", input));

        if let Some(caps) = explicit_method_re().captures(input) {
            let method = Method::from_str(&caps["method"]).ok_or_else(|| {
                CvsError::Config(format!("Unsupported CVSROOT method: {}", &caps["method"]))
            })?;
            let port = match caps.name("port") {
                Some(p) => Some(p.as_str().parse::<u16>().map_err(|_| invalid())?),
                None => None,
            };
            let root = Self {
                method,
                user: caps.name("user").map(|m| m.as_str().to_string()),
                password: caps.name("password").map(|m| m.as_str().to_string()),
                host: caps.name("host").map(|m| m.as_str().to_string()),
                port,
                repository: caps["path"].to_string(),
            };
            if method != Method::Fork && root.host.is_none() {
                return Err(CvsError::Config(format!(
                    "CVSROOT method {} requires a host: {}",
                    method.as_str(),
                    input
                )));
            }
            return Ok(root);
        }

        if let Some(caps) = implicit_ext_re().captures(input) {
            return Ok(Self {
                method: Method::Ext,
                user: caps.name("user").map(|m| m.as_str().to_string()),
                password: None,
                host: Some(caps["host"].to_string()),
                port: None,
                repository: caps["path"].to_string(),
            });
        }

        if input.starts_with('/') {
            return Ok(Self {
                method: Method::Fork,
                user: None,
                password: None,
                host: None,
                port: None,
                repository: input.to_string(),
            });
        }

        Err(invalid())
    }

    /// User name, falling back to the local account.
    pub fn user_or_default(&self) -> String {
        self.user.clone().unwrap_or_else(whoami::username)
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PSERVER_PORT)
    }

    /// Same server and repository, ignoring password and port defaulting.
    pub fn same_location(&self, other: &CvsRoot) -> bool {
        self.method == other.method
            && self.user_or_default() == other.user_or_default()
            && self.host == other.host
            && self.port_or_default() == other.port_or_default()
            && self.repository == other.repository
    }
}

impl FromStr for CvsRoot {
    type Err = CvsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CvsRoot {
    /// Canonical form without the password, with the pserver port spelled out.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}:", self.method.as_str())?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        if let Some(host) = &self.host {
            write!(f, "{}:", host)?;
            if self.method == Method::PServer {
                write!(f, "{}", self.port_or_default())?;
            }
        }
        write!(f, "{}", self.repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pserver_with_port() {
        let root = CvsRoot::parse(":pserver:anon@cvs.example.org:2402/cvsroot").unwrap();
        assert_eq!(root.method, Method::PServer);
        assert_eq!(root.user.as_deref(), Some("anon"));
        assert_eq!(root.host.as_deref(), Some("cvs.example.org"));
        assert_eq!(root.port, Some(2402));
        assert_eq!(root.repository, "/cvsroot");
    }

    #[test]
    fn test_parse_pserver_with_password_no_port() {
        let root = CvsRoot::parse(":pserver:anon:secret@host:/var/cvs").unwrap();
        assert_eq!(root.password.as_deref(), Some("secret"));
        assert_eq!(root.port, None);
        assert_eq!(root.port_or_default(), DEFAULT_PSERVER_PORT);
        assert_eq!(root.to_string(), ":pserver:anon@host:2401/var/cvs");
    }

    #[test]
    fn test_parse_implicit_forms() {
        let ext = CvsRoot::parse("dev@host:/srv/cvs").unwrap();
        assert_eq!(ext.method, Method::Ext);
        assert_eq!(ext.user.as_deref(), Some("dev"));

        let local = CvsRoot::parse("/srv/cvs").unwrap();
        assert_eq!(local.method, Method::Fork);
        assert_eq!(local.host, None);

        let local = CvsRoot::parse(":local:/srv/cvs").unwrap();
        assert_eq!(local.method, Method::Fork);
        assert_eq!(local.to_string(), ":fork:/srv/cvs");
    }

    #[test]
    fn test_parse_rejects_bad_roots() {
        assert!(CvsRoot::parse(":gserver:host:/cvs").is_err());
        assert!(CvsRoot::parse(":pserver:/cvs").is_err());
        assert!(CvsRoot::parse("relative/path").is_err());
        assert!(CvsRoot::parse(":pserver:host:99999/cvs").is_err());
    }

    #[test]
    fn test_same_location_defaults_port() {
        let a = CvsRoot::parse(":pserver:anon@host:/cvs").unwrap();
        let b = CvsRoot::parse(":pserver:anon:pw@host:2401/cvs").unwrap();
        let c = CvsRoot::parse(":pserver:anon@host:2402/cvs").unwrap();
        assert!(a.same_location(&b));
        assert!(!a.same_location(&c));
    }
}
