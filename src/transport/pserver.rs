//! `:pserver:` connections - TCP with the password authentication exchange.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::{auth_error, not_open, Connection, ConnectionLogger};
use crate::error::Result;
use crate::root::CvsRoot;

/// Substitution table from the reference CVS implementation (scramble.c).
const SHIFTS: [u8; 256] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 114, 120, 53, 79, 96, 109, 72, 108, 70, 64, 76, 67, 116, 74, 68, 87,
    111, 52, 75, 119, 49, 34, 82, 81, 95, 65, 112, 86, 118, 110, 122, 105, 41, 57, 83, 43, 46,
    102, 40, 89, 38, 103, 45, 50, 42, 123, 91, 35, 125, 55, 54, 66, 124, 126, 59, 47, 92, 71, 115,
    78, 88, 107, 106, 56, 36, 121, 117, 104, 101, 100, 69, 73, 99, 63, 94, 93, 39, 37, 61, 48, 58,
    113, 32, 90, 44, 98, 60, 51, 33, 97, 62, 77, 84, 80, 85, 223, 225, 216, 187, 166, 229, 189,
    222, 188, 141, 249, 148, 200, 184, 136, 248, 190, 199, 170, 181, 204, 138, 232, 218, 183, 255,
    234, 220, 247, 213, 203, 226, 193, 174, 172, 228, 252, 217, 201, 131, 230, 197, 211, 145, 238,
    161, 179, 160, 212, 207, 221, 254, 173, 202, 146, 224, 151, 140, 196, 205, 130, 135, 133, 143,
    246, 192, 159, 244, 239, 185, 168, 215, 144, 139, 165, 180, 157, 147, 186, 214, 176, 227, 231,
    219, 169, 175, 156, 206, 198, 129, 164, 150, 210, 154, 177, 134, 127, 182, 128, 158, 208, 162,
    132, 167, 209, 149, 241, 153, 251, 237, 236, 171, 195, 243, 233, 253, 240, 194, 250, 191, 155,
    142, 137, 245, 235, 163, 242, 178, 152,
];

const AUTH_OK: &str = "I LOVE YOU";
const AUTH_REJECTED: &str = "I HATE YOU";

/// Scramble a password the way `cvs login` stores and sends it.
pub fn scramble(password: &str) -> String {
    let mut out = String::with_capacity(password.len() + 1);
    out.push('A');
    out.extend(password.bytes().map(|b| SHIFTS[b as usize] as char));
    out
}

/// `~/.cvspass`, or `$CVS_PASSFILE` when set.
pub fn default_cvspass_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CVS_PASSFILE") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".cvspass"))
}

/// Find the scrambled password stored for `root`.
///
/// Understands both the versioned `/1 :pserver:... Axxx` lines and the
/// legacy `:pserver:... Axxx` lines.
pub fn lookup_cvspass(path: &Path, root: &CvsRoot) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    content.lines().find_map(|line| {
        let line = line.strip_prefix("/1 ").unwrap_or(line);
        let (entry_root, scrambled) = line.split_once(' ')?;
        let entry = CvsRoot::parse(entry_root).ok()?;
        entry
            .same_location(root)
            .then(|| scrambled.trim_end().to_string())
    })
}

pub struct PServerConnection {
    root: CvsRoot,
    scrambled_password: String,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl PServerConnection {
    pub fn new(root: CvsRoot, scrambled_password: String, connect_timeout: Duration) -> Self {
        Self {
            root,
            scrambled_password,
            connect_timeout,
            stream: None,
        }
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let host = self.root.host.as_deref().unwrap_or("localhost");
        let addr = (host, self.root.port_or_default())
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {}", host))
            })?;
        TcpStream::connect_timeout(&addr, self.connect_timeout)
    }

    fn authenticate(&self, stream: &TcpStream, logger: &dyn ConnectionLogger) -> Result<()> {
        let user = self.root.user_or_default();
        let request = format!(
            "BEGIN AUTH REQUEST\n{}\n{}\n{}\nEND AUTH REQUEST\n",
            self.root.repository, user, self.scrambled_password
        );
        let mut writer = stream;
        writer
            .write_all(request.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(auth_error)?;
        logger.log_output(
            format!(
                "BEGIN AUTH REQUEST\n{}\n{}\nA***\nEND AUTH REQUEST\n",
                self.root.repository, user
            )
            .as_bytes(),
        );

        // Unbuffered so nothing past the verdict is consumed here
        let mut reader = BufReader::with_capacity(1, stream);
        let mut messages = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).map_err(auth_error)? == 0 {
                return Err(auth_error("server closed the connection during authentication"));
            }
            logger.log_input(line.as_bytes());
            let line = line.trim_end_matches('\n');

            if line == AUTH_OK {
                debug!(root = %self.root, "pserver authentication accepted");
                return Ok(());
            }
            if line == AUTH_REJECTED {
                return Err(auth_error(format!(
                    "authentication rejected for {}",
                    self.root
                )));
            }
            if let Some(message) = line.strip_prefix("E ") {
                messages.push(message.to_string());
                continue;
            }
            if let Some(rest) = line.strip_prefix("error") {
                messages.push(rest.trim().to_string());
                messages.retain(|m| !m.is_empty());
                return Err(auth_error(messages.join("; ")));
            }
            return Err(auth_error(format!("unexpected authentication reply: {}", line)));
        }
    }
}

impl Connection for PServerConnection {
    fn open(&mut self, logger: &dyn ConnectionLogger) -> Result<()> {
        let stream = self.connect().map_err(|e| {
            auth_error(format!(
                "cannot connect to {}:{}: {}",
                self.root.host.as_deref().unwrap_or("localhost"),
                self.root.port_or_default(),
                e
            ))
        })?;
        self.authenticate(&stream, logger)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn input_stream(&mut self) -> io::Result<Box<dyn Read + Send>> {
        let stream = self.stream.as_ref().ok_or_else(not_open)?;
        Ok(Box::new(stream.try_clone()?))
    }

    fn output_stream(&mut self) -> io::Result<Box<dyn Write + Send>> {
        let stream = self.stream.as_ref().ok_or_else(not_open)?;
        Ok(Box::new(stream.try_clone()?))
    }

    fn repository(&self) -> &str {
        &self.root.repository
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.take() {
            Some(stream) => match stream.shutdown(Shutdown::Both) {
                Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }
}
