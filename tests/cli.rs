//! The `confgen` binary end to end: schema files in, artifacts and exit codes out.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const GOOD: &str = r#"
schema cli version 3 {
    name: string(8) = "cw";
    keyer {
        wpm: u8 = 20 [5..60];
    }
}
"#;

const BAD: &str = "schema cli version 3 { wpm: u8 = 100 [5..60]; }";

fn confgen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_confgen"))
        .args(args)
        .output()
        .expect("run confgen")
}

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, text).expect("write schema");
    path.to_string_lossy().into_owned()
}

#[test]
fn device_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "good.cfg", GOOD);
    let out = confgen(&["device", &schema]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("pub const VERSION: u32 = 3;"));
    assert!(text.contains("pub mod keys"));
}

#[test]
fn migration_mode_and_out_file() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "good.cfg", GOOD);
    let target = dir.path().join("settings.rs");
    let out = confgen(&["device", &schema, "--migration", "-o", target.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    let text = fs::read_to_string(&target).unwrap();
    assert!(text.contains("pub struct RawConfig"));
    assert!(!text.contains("pub mod keys"));
}

#[test]
fn client_and_wire_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "good.cfg", GOOD);
    let client = confgen(&["client", &schema]);
    assert!(client.status.success());
    assert!(String::from_utf8_lossy(&client.stdout).contains("from \"./wire\""));
    let wire = confgen(&["wire-runtime"]);
    assert!(String::from_utf8_lossy(&wire.stdout).contains("export class Reader"));
}

#[test]
fn migration_between_two_files() {
    let dir = tempfile::tempdir().unwrap();
    let old = write(dir.path(), "v1.cfg", GOOD);
    let new = write(dir.path(), "v2.cfg", &GOOD.replace("version 3", "version 4"));
    let out = confgen(&[
        "migration", &old, &new, "--old-module", "crate::v3", "--new-module", "crate::v4",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("pub fn up(from: &crate::v3::RawConfig) -> crate::v4::RawConfig"));
}

#[test]
fn layout_table() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "good.cfg", GOOD);
    let out = confgen(&["layout", &schema]);
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("keyer.wpm"));
    assert!(text.contains("2 leaves"));
}

#[test]
fn lint_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.cfg", GOOD);
    let bad = write(dir.path(), "bad.cfg", BAD);
    assert!(confgen(&["lint", &good]).status.success());

    let out = confgen(&["lint", &good, &bad]);
    assert_eq!(out.status.code(), Some(1));
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("[default-out-of-range]"));
    assert!(String::from_utf8_lossy(&out.stderr).contains("1 error(s)"));
}

#[test]
fn invalid_schema_fails_generation() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(dir.path(), "bad.cfg", BAD);
    let out = confgen(&["device", &bad]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("lint error"));
}

#[test]
fn missing_file_is_reported() {
    let out = confgen(&["client", "/nonexistent/schema.cfg"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("reading schema"));
}
