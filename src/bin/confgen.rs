//! Schema compiler front end.
//!
//! Usage:
//!   confgen device SCHEMA [--migration] [-o OUT]
//!   confgen client SCHEMA [-o OUT]
//!   confgen wire-runtime [-o OUT]
//!   confgen migration OLD NEW --old-module PATH --new-module PATH [-o OUT]
//!   confgen layout SCHEMA
//!   confgen lint SCHEMA...
//!
//! Output goes to stdout unless `-o` names a file. `lint` exits 1 when any schema
//! has an error-level finding.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confgen::backend::{self, DeviceMode, MigrationModules, WIRE_RUNTIME_TS};
use confgen::lint::{lint, Severity};
use confgen::{dump, parser, Schema};
use env_logger::Env;
use log::LevelFilter;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(version, about = "Settings-tree schema compiler", long_about = None)]
struct Cli {
    /// Write the artifact here instead of stdout.
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    /// Log generation steps (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rust device code.
    Device {
        schema: PathBuf,
        /// Record, defaults and codec only; no accessors or update messages.
        #[arg(long)]
        migration: bool,
    },
    /// TypeScript client module (imports `./wire`).
    Client { schema: PathBuf },
    /// The TypeScript `./wire` runtime shared by every client.
    WireRuntime,
    /// Rust `up`/`down` conversions between two schema versions.
    Migration {
        old: PathBuf,
        new: PathBuf,
        /// Module path of the old version's migration-mode record.
        #[arg(long)]
        old_module: String,
        /// Module path of the new version's migration-mode record.
        #[arg(long)]
        new_module: String,
    },
    /// Table of leaves in wire order with worst-case sizes.
    Layout { schema: PathBuf },
    /// Check schemas; exit 1 on errors.
    Lint {
        #[arg(required = true)]
        schemas: Vec<PathBuf>,
    },
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

fn load(path: &Path) -> Result<Schema> {
    parser::parse_file(path).with_context(|| format!("reading schema {}", path.display()))
}

fn emit(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("writing {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Print every finding; returns whether any was an error.
fn run_lint(schemas: &[PathBuf]) -> Result<bool> {
    let mut errors = 0usize;
    let mut warnings = 0usize;
    for path in schemas {
        let schema = load(path)?;
        for m in lint(&schema) {
            match m.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
            }
            println!("{}: {}", path.display(), m);
        }
    }
    if errors > 0 || warnings > 0 {
        eprintln!("lint: {} error(s), {} warning(s)", errors, warnings);
    }
    Ok(errors > 0)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let out = cli.out.as_deref();
    match &cli.command {
        Command::Device { schema, migration } => {
            let mode = if *migration {
                DeviceMode::Migration
            } else {
                DeviceMode::Full
            };
            let src = backend::generate_device(&load(schema)?, mode)
                .with_context(|| format!("generating device code for {}", schema.display()))?;
            emit(out, &src)
        }
        Command::Client { schema } => {
            let src = backend::generate_client(&load(schema)?)
                .with_context(|| format!("generating client code for {}", schema.display()))?;
            emit(out, &src)
        }
        Command::WireRuntime => emit(out, WIRE_RUNTIME_TS),
        Command::Migration {
            old,
            new,
            old_module,
            new_module,
        } => {
            let modules = MigrationModules::new(old_module.as_str(), new_module.as_str());
            let src = backend::generate_migration(&load(old)?, &load(new)?, &modules)
                .context("generating migration")?;
            emit(out, &src)
        }
        Command::Layout { schema } => emit(out, &dump::render_layout(&load(schema)?)),
        Command::Lint { schemas } => {
            if run_lint(schemas)? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
