//! `segb-dump`: print the entries of a SEGB v1 or v2 container.
//!
//! # Usage
//!
//! ```text
//! segb-dump [--no-verify-crc] [--no-hexdump] <PATH>
//! ```
//!
//! `PATH` falls back to `SEGB_FILE` when omitted.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use segb::dump::{self, DumpOptions};

/// Dump the entries of a SEGB v1 or v2 container.
#[derive(Parser, Debug)]
#[command(name = "segb-dump", version, about)]
struct Cli {
    /// Path of the container to decode.
    #[arg(env = "SEGB_FILE")]
    path: PathBuf,

    /// Skip per-entry checksum verification.
    #[arg(long)]
    no_verify_crc: bool,

    /// Skip the per-entry hexdump.
    #[arg(long)]
    no_hexdump: bool,
}

/// Dump configuration resolved from the command line and environment variables.
///
/// # Sources
///
/// | Source               | Required | Default | Description                                |
/// |----------------------|----------|---------|--------------------------------------------|
/// | `PATH` argument      | one of   | --      | Path of the container to decode            |
/// | `SEGB_FILE`          | one of   | --      | Path used when no argument is given        |
/// | `SEGB_VERIFY_CRC`    | No       | `true`  | Report per-entry checksum verification     |
/// | `SEGB_HEXDUMP`       | No       | `true`  | Print a hexdump of each entry's data       |
///
/// `--no-verify-crc` and `--no-hexdump` switch a section off regardless of
/// the environment.
#[derive(Debug, Clone, PartialEq)]
struct Config {
    /// Path of the SEGB container to decode.
    path: PathBuf,
    /// Rendering options.
    options: DumpOptions,
}

impl Config {
    /// Combine parsed arguments with the boolean environment flags.
    ///
    /// # Errors
    ///
    /// Returns `Err(String)` if `SEGB_VERIFY_CRC` or `SEGB_HEXDUMP` is set but
    /// not a boolean.
    fn from_cli(cli: Cli) -> Result<Config, String> {
        let options = DumpOptions {
            verify_crc: env_flag("SEGB_VERIFY_CRC", true)? && !cli.no_verify_crc,
            hexdump: env_flag("SEGB_HEXDUMP", true)? && !cli.no_hexdump,
        };
        Ok(Config {
            path: cli.path,
            options,
        })
    }
}

/// Read a boolean environment variable, falling back to `default` when unset.
///
/// Accepts `true`/`false`, `1`/`0`, `yes`/`no` (case-insensitive).
fn env_flag(name: &str, default: bool) -> Result<bool, String> {
    match std::env::var(name) {
        Ok(val) => match val.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(format!("{name} is not a valid boolean: {val}")),
        },
        Err(_) => Ok(default),
    }
}

/// Initialize the global `tracing` subscriber with an `EnvFilter`.
///
/// Reads `RUST_LOG`, defaulting to `"info"`. Uses `try_init()` so repeated
/// calls (e.g., across tests in the same process) are a silent no-op. Logs go
/// to stderr so they never interleave with the report on stdout.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();

    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    tracing::debug!(path = %config.path.display(), "Opening container");
    let file = match File::open(&config.path) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(path = %config.path.display(), error = %e, "Failed to open file");
            std::process::exit(1);
        }
    };

    let segb = match segb::decode(&mut BufReader::new(file)) {
        Ok(segb) => segb,
        Err(e) => {
            tracing::error!(path = %config.path.display(), error = %e, "Failed to decode");
            std::process::exit(1);
        }
    };
    tracing::info!(
        version = %segb.version,
        entries = segb.entries.len(),
        "Decoded container"
    );

    print!("{}", dump::render(&segb, &config.options));
}
