//! unicall CLI - dynamic invocation over the built-in sample registry.
//!
//! Three modes:
//!
//! - `unicall invoke <REQUEST>` — run one invoke request and print the
//!   envelope
//! - `unicall list <REQUEST>` — run one list request and print the envelope
//! - `unicall serve` — read line-delimited JSON requests from stdin and
//!   write one envelope per line to stdout
//!
//! A request is a JSON object in the shared wire shape (`package`, `class`,
//! `method`, `methodArgs`, ...). `-` (or omitting the argument) reads the
//! request from stdin. As-you-go callback notices are written to stderr as
//! JSON lines so they never interleave with envelopes.
//!
//! # Configuration
//!
//! `--config <FILE>` loads engine settings from TOML; values present in
//! the file override the defaults.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use unicall_engine::{CallbackNotice, Engine, EngineConfig};
use unicall_registry::testing::sample_registry;

/// unicall CLI - dynamic invocation engine frontend
#[derive(Parser, Debug)]
#[command(name = "unicall")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one invoke request and print the envelope
    Invoke {
        /// Request JSON; `-` or omitted reads stdin
        request: Option<String>,
    },
    /// Run one list request and print the envelope
    List {
        /// Request JSON; `-` or omitted reads stdin
        request: Option<String>,
    },
    /// Serve line-delimited JSON requests from stdin
    ///
    /// Each input line is a request object; an optional `"action"` field
    /// selects `"invoke"` (default) or `"list"`.
    Serve,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_deref())?;
    debug!(?config, "engine configuration");

    let (tx, rx) = mpsc::channel();
    let engine = Engine::new(Arc::new(sample_registry()), config).with_notifier(tx);

    match args.command {
        Command::Invoke { request } => {
            let request = read_request(request.as_deref())?;
            let envelope = engine.invoke(&request);
            drain_notices(&rx)?;
            println!("{envelope}");
        }
        Command::List { request } => {
            let request = read_request(request.as_deref())?;
            let envelope = engine.list(&request);
            println!("{envelope}");
        }
        Command::Serve => serve(&engine, &rx)?,
    }

    Ok(())
}

/// Loads the engine configuration, merging an optional TOML file over the
/// defaults.
fn load_config(path: Option<&std::path::Path>) -> Result<EngineConfig> {
    let mut config = EngineConfig::new();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let loaded = EngineConfig::from_toml(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.merge(&loaded);
        info!(path = %path.display(), "loaded engine config");
    }
    Ok(config)
}

/// Reads the request JSON from the argument, or stdin for `-`/omitted.
fn read_request(arg: Option<&str>) -> Result<serde_json::Value> {
    let text = match arg {
        Some("-") | None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("cannot read request from stdin")?;
            buffer
        }
        Some(text) => text.to_string(),
    };
    serde_json::from_str(&text).context("request is not valid JSON")
}

/// The line-delimited serve loop: one request in, one envelope out.
fn serve(engine: &Engine, notices: &mpsc::Receiver<CallbackNotice>) -> Result<()> {
    info!("serving line-delimited requests on stdin");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("cannot read request line")?;
        if line.trim().is_empty() {
            continue;
        }

        let envelope = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(mut request) => {
                let action = request
                    .as_object_mut()
                    .and_then(|map| map.remove("action"))
                    .and_then(|a| a.as_str().map(str::to_string))
                    .unwrap_or_else(|| "invoke".to_string());
                match action.as_str() {
                    "list" => engine.list(&request),
                    _ => engine.invoke(&request),
                }
            }
            Err(err) => serde_json::json!({
                "ok": false,
                "code": 500,
                "msg": format!("request is not valid JSON: {err}"),
                "throw": "ValidationError",
            }),
        };

        drain_notices(notices)?;
        writeln!(stdout, "{envelope}").context("cannot write envelope")?;
        stdout.flush().context("cannot flush stdout")?;
    }
    Ok(())
}

/// Forwards queued callback notices to stderr, one JSON line each.
fn drain_notices(notices: &mpsc::Receiver<CallbackNotice>) -> Result<()> {
    let mut stderr = std::io::stderr().lock();
    while let Ok(notice) = notices.try_recv() {
        let line = serde_json::to_string(&notice).context("cannot serialize notice")?;
        writeln!(stderr, "{line}").context("cannot write notice")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_request_parses() {
        let request = read_request(Some(r#"{"package": "unicall.test", "method": "test"}"#))
            .expect("valid request");
        assert_eq!(request["method"], serde_json::json!("test"));
    }

    #[test]
    fn invalid_request_is_an_error() {
        assert!(read_request(Some("{not json")).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(Some(std::path::Path::new("/no/such/unicall.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }

    #[test]
    fn default_config_without_file() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config, EngineConfig::new());
    }
}
