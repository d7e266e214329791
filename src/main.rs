//! `ontap-module`: runs one resource module.
//!
//! Reads `{"params": {...}, "check_mode": bool}` from stdin (or `--input`),
//! writes exactly one JSON envelope to stdout and logs to stderr.

use clap::Parser;
use leeca_ontap::module::{
    application::service::module_runner::ModuleRunner,
    host::{ModuleHost, stdio_host::StdioHost},
};
use leeca_ontap::{ResultEnvelope, resources};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Run a declarative NetApp ONTAP module
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Module to run (cli_timeout, flexcache, snmp_traphosts)
    #[arg(long)]
    module: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Read the input document from a file instead of stdin
    #[arg(long)]
    input: Option<PathBuf>,
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries the envelope
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}

async fn run(args: &Args) -> io::Result<()> {
    let input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };

    let mut host = match StdioHost::from_reader(input, io::stdout()) {
        Ok(host) => host,
        Err(e) => {
            let mut host = StdioHost::new(Default::default(), false, io::stdout());
            return host.fail(ResultEnvelope::failure(e.to_string()));
        }
    };

    match resources::find(&args.module) {
        Some(module) => ModuleRunner::new().run(module.as_ref(), &mut host).await,
        None => host.fail(ResultEnvelope::failure(format!(
            "Error: unknown module '{}', expected one of: {}",
            args.module,
            resources::MODULE_NAMES.join(", ")
        ))),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "host fault");
            eprintln!("ontap-module: {e}");
            ExitCode::FAILURE
        }
    }
}
