//! Probe a CVS server: connect, negotiate, run `version`.
//!
//! ```text
//! cvs-probe -d :pserver:anonymous@cvs.example.org:/cvsroot -z 6 -v
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use cvsclient::protocol::{Command, MessageCollector, Request, Requests};
use cvsclient::session::ProgressHandler;
use cvsclient::transport::Connector;
use cvsclient::{ClientConfig, ClientEnvironment, CvsRoot, RequestProcessor};

#[derive(Parser, Debug)]
#[command(name = "cvs-probe", version, about = "Check what a CVS server supports")]
struct Cli {
    /// Repository root, e.g. :pserver:user@host:/cvsroot
    #[arg(short = 'd', long, env = "CVSROOT")]
    cvsroot: Option<String>,

    /// Configuration file (defaults to <config dir>/cvsclient/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compression level for gzip-stream (1-9)
    #[arg(short = 'z', value_parser = clap::value_parser!(u32).range(1..=9))]
    gzip_level: Option<u32>,

    /// Write raw protocol traffic to <prefix>.in / <prefix>.out
    #[arg(long = "log", value_name = "PREFIX")]
    protocol_log: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Spinner fed by session progress.
struct Spinner {
    bar: ProgressBar,
    valid_requests: HashSet<String>,
}

impl Spinner {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .context("Invalid spinner template")?,
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Negotiating...");
        Ok(Self {
            bar,
            valid_requests: HashSet::new(),
        })
    }
}

impl ProgressHandler for Spinner {
    fn valid_requests_received(&mut self, requests: &HashSet<String>) {
        self.valid_requests = requests.clone();
        self.bar
            .set_message(format!("Server supports {} requests", requests.len()));
    }

    fn request_sent(&mut self, request: &Request) {
        self.bar.set_message(format!("Sent {}", request.name()));
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli.config.clone().or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("cvsclient").join("config.toml"))
            .filter(|path| path.exists())
    });
    let mut config = match path {
        Some(path) => ClientConfig::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ClientConfig::default(),
    };
    config.apply_env();

    if let Some(root) = &cli.cvsroot {
        config.cvsroot = Some(root.clone());
    }
    if cli.gzip_level.is_some() {
        config.gzip_level = cli.gzip_level;
    }
    if cli.protocol_log.is_some() {
        config.protocol_log = cli.protocol_log.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cvsclient::logging::init(cli.verbose);

    let config = load_config(&cli)?;
    let root: CvsRoot = config
        .cvsroot
        .as_deref()
        .context("No CVSROOT given (use -d or set CVSROOT)")?
        .parse()
        .context("Invalid CVSROOT")?;

    let environment = ClientEnvironment::new(config.clone()).with_protocol_log()?;
    let processor = RequestProcessor::new(Connector::new(root.clone(), config), environment);

    let mut spinner = Spinner::new()?;
    let mut output = MessageCollector::default();
    let result = processor.process_requests(
        &Requests::new(Command::Version),
        &mut output,
        &mut spinner,
    );
    spinner.bar.finish_and_clear();
    let ok = result.with_context(|| format!("Session with {} failed", root))?;

    println!("{} {}", "Server:".bold(), root);
    let mut requests: Vec<&String> = spinner.valid_requests.iter().collect();
    requests.sort();
    println!("{} ({})", "Valid requests".bold(), requests.len());
    for name in requests {
        println!("  {}", name.as_str().green());
    }

    for line in &output.messages {
        println!("{}", line);
    }
    for line in &output.errors {
        eprintln!("{}", line.as_str().red());
    }

    if ok {
        println!("{}", "ok".green().bold());
        Ok(())
    } else {
        anyhow::bail!("Server answered version with an error")
    }
}
