//! Command-line front end for the signing timing harness.
//!
//! # Usage
//!
//! ```bash
//! # Time 10,000 RFC 6979 signatures over 32-byte blocks
//! head -c 320000 /dev/urandom > blocks.bin
//! taskset -c 2 sigtime run --backend deterministic \
//!   -i blocks.bin -o sigs.bin -t times.bin -k key.pem
//!
//! # Fixed-width output, larger blocks, first 100 blocks only
//! sigtime run --backend sexp -i blocks.bin -o sigs.bin -t times.bin \
//!   -k key.txt -s 64 -n 100
//!
//! # Estimate how many ticks the counter advances per second
//! sigtime calibrate
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sigtime::{Backend, RunConfig, DEFAULT_BLOCK_SIZE};

/// Cycle-accurate ECDSA signing timing harness
#[derive(Parser, Debug)]
#[command(name = "sigtime")]
#[command(about = "Record per-signature cycle counts for ECDSA backends")]
#[command(version)]
struct Cli {
    /// Show debug output (overrides RUST_LOG)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign every block of the input and record the tick cost of each signature
    Run(RunArgs),

    /// Estimate the counter frequency against the OS monotonic clock
    Calibrate,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Signing backend
    #[arg(short, long, value_enum)]
    backend: Backend,

    /// Input file of fixed-size blocks
    #[arg(short, long)]
    input: PathBuf,

    /// Signature output file (created or truncated)
    #[arg(short = 'o', long)]
    signatures: PathBuf,

    /// Timing output file of 8-byte native-endian tick deltas (created or truncated)
    #[arg(short = 't', long)]
    timings: PathBuf,

    /// Key material: PEM file, tag/value file or key store directory, per backend
    #[arg(short, long)]
    key: PathBuf,

    /// Block size in bytes (at least 16 for sexp)
    #[arg(short = 's', long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Stop after this many blocks
    #[arg(short = 'n', long)]
    limit: Option<u64>,
}

impl RunArgs {
    fn into_config(self) -> RunConfig {
        let config = RunConfig::new(
            self.backend,
            self.input,
            self.signatures,
            self.timings,
            self.key,
        )
        .block_size(self.block_size);
        match self.limit {
            Some(limit) => config.limit(limit),
            None => config,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn calibrate() -> ExitCode {
    let name = sigtime_core::counter_name();
    info!("calibrating {}", name);

    let hz = sigtime_core::counter_frequency_hz();
    if hz == 0 {
        error!("could not determine {} frequency", name);
        return ExitCode::FAILURE;
    }

    println!("{}: {} Hz ({:.2} MHz)", name, hz, hz as f64 / 1e6);
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Run(args) => match sigtime::run(&args.into_config()) {
            Ok(_) => ExitCode::SUCCESS,
            // Already logged by the harness.
            Err(_) => ExitCode::FAILURE,
        },
        Command::Calibrate => calibrate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "sigtime", "run", "--backend", "sexp", "-i", "in", "-o", "sigs", "-t", "times", "-k",
            "key.txt", "-s", "64", "-n", "5",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.into_config();
        assert_eq!(config.backend, Backend::Sexp);
        assert_eq!(config.block_size, 64);
        assert_eq!(config.limit, Some(5));
        assert_eq!(config.key.path(), std::path::Path::new("key.txt"));
    }

    #[test]
    fn test_run_defaults_and_rejects_unknown_backend() {
        let cli = Cli::try_parse_from([
            "sigtime", "-q", "run", "-b", "pem", "-i", "in", "-o", "sigs", "-t", "times", "-k", "k",
        ])
        .unwrap();
        assert!(cli.quiet);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(args.limit, None);

        assert!(Cli::try_parse_from([
            "sigtime", "run", "-b", "rsa", "-i", "in", "-o", "sigs", "-t", "times", "-k", "k",
        ])
        .is_err());
    }
}
