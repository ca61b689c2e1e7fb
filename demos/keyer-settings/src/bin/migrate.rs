//! Convert one stored settings blob between versions.
//!
//! Usage:
//!   migrate up   < v1.bin > v2.bin
//!   migrate down < v2.bin > v1.bin
//!
//! On a blob that does not decode as the source version, prints a diagnostic on
//! stderr, writes nothing to stdout and exits with status 1.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::LevelFilter;
use std::io::{self, Read, Write};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Direction {
    /// Version 1 to current.
    Up,
    /// Current to version 1.
    Down,
}

#[derive(Debug, Parser)]
#[command(version, about = "Migrate keyer settings blobs between schema versions", long_about = None)]
struct Cli {
    direction: Direction,

    /// Log conversion steps.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()))
        .try_init();
}

fn run(direction: Direction) -> Result<Vec<u8>> {
    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input).context("reading stdin")?;
    log::debug!("read {} byte(s), migrating {:?}", input.len(), direction);
    let output = match direction {
        Direction::Up => keyer_settings::upgrade(&input).context("decoding version 1 blob")?,
        Direction::Down => keyer_settings::downgrade(&input).context("decoding current blob")?,
    };
    Ok(output)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let written = run(cli.direction).and_then(|bytes| {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&bytes).context("writing stdout")?;
        stdout.flush().context("writing stdout")
    });
    if let Err(e) = written {
        eprintln!("migrate: {:#}", e);
        std::process::exit(1);
    }
}
