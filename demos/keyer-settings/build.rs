// keyer-settings - Build Script
//
// Generates the settings modules from schema/*.cfg before compilation.

use anyhow::{Context, Result};
use confgen::{generate_device, generate_migration, parse_file, DeviceMode, MigrationModules};
use std::path::{Path, PathBuf};

fn write(out_dir: &Path, name: &str, text: &str) -> Result<()> {
    let path = out_dir.join(name);
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").context("OUT_DIR not set")?);
    let schema = |name: &str| {
        let path = Path::new("schema").join(name);
        println!("cargo:rerun-if-changed={}", path.display());
        parse_file(&path).with_context(|| format!("parsing {}", path.display()))
    };

    let v1 = schema("v1.cfg")?;
    let v2 = schema("v2.cfg")?;

    // The running device uses the current version with the full accessor layer.
    write(&out_dir, "settings.rs", &generate_device(&v2, DeviceMode::Full)?)?;
    // Older versions only need their record and wire format.
    write(&out_dir, "settings_v1.rs", &generate_device(&v1, DeviceMode::Migration)?)?;
    let modules = MigrationModules::new("crate::v1", "crate::settings");
    write(&out_dir, "conversions.rs", &generate_migration(&v1, &v2, &modules)?)?;

    write(&out_dir, "minimal.rs", &generate_device(&schema("minimal.cfg")?, DeviceMode::Full)?)?;
    write(&out_dir, "counters.rs", &generate_device(&schema("counters.cfg")?, DeviceMode::Full)?)?;
    write(&out_dir, "labels.rs", &generate_device(&schema("labels.cfg")?, DeviceMode::Full)?)?;
    Ok(())
}
