//! The `migrate` binary end to end, and the conversions it is built on.

use confgen::runtime::bounded;
use keyer_settings::settings::{self, IambicMode};
use keyer_settings::{conversions, downgrade, upgrade, v1};
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn migrate(direction: &str, input: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_migrate"))
        .arg(direction)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn migrate");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input)
        .expect("write stdin");
    child.wait_with_output().expect("wait for migrate")
}

fn sample_v1() -> v1::RawConfig {
    let mut old = v1::RawConfig::default();
    old.name = bounded("iu3qez").unwrap();
    old.keyer__wpm = 28;
    old.keyer__mode = v1::IambicMode::Straight;
    old.audio__volume_db = -20;
    old.calibration_ppm = -42;
    old.network__home__ssid = bounded("shack").unwrap();
    old
}

#[test]
fn up_keeps_shared_leaves_and_defaults_new_ones() {
    let new = conversions::up(&sample_v1());
    assert_eq!(new.name.as_str(), "iu3qez");
    assert_eq!(new.keyer__wpm, 28);
    assert_eq!(new.keyer__mode, IambicMode::Straight);
    assert_eq!(new.audio__volume_db, -20);
    assert_eq!(new.calibration_ppm, -42);
    assert_eq!(new.network__home__ssid.as_str(), "shack");
    assert_eq!(new.keyer__dit_dah_ratio, 300);
}

#[test]
fn down_maps_unknown_variant_to_default() {
    let mut new = settings::RawConfig::default();
    new.keyer__mode = IambicMode::Ultimatic;
    new.keyer__dit_dah_ratio = 420;
    new.expert = true;
    let old = conversions::down(&new);
    assert_eq!(old.keyer__mode, v1::IambicMode::IambicA);
    assert!(old.expert);
}

#[test]
fn up_then_down_is_lossless_for_version_one_data() {
    let old = sample_v1();
    assert_eq!(conversions::down(&conversions::up(&old)), old);
}

#[test]
fn library_round_trip_through_blobs() {
    let old = sample_v1().serialize();
    let new = upgrade(&old).unwrap();
    assert_eq!(&new[..4], &settings::VERSION.to_le_bytes());
    assert_eq!(downgrade(&new).unwrap(), old);
    assert!(upgrade(&new).is_err());
}

#[test]
fn binary_upgrades_stdin_to_stdout() {
    let out = migrate("up", &sample_v1().serialize());
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let new = settings::RawConfig::deserialize(&out.stdout).unwrap();
    assert_eq!(new.keyer__wpm, 28);
}

#[test]
fn binary_downgrades() {
    let mut new = settings::RawConfig::default();
    new.display__brightness = 200;
    let out = migrate("down", &new.serialize());
    assert!(out.status.success());
    let old = v1::RawConfig::deserialize(&out.stdout).unwrap();
    assert_eq!(old.display__brightness, 200);
}

#[test]
fn binary_rejects_wrong_version() {
    let out = migrate("up", &settings::RawConfig::default().serialize());
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("wrong version: expected 1, found 2"), "{}", stderr);
}

#[test]
fn binary_rejects_truncated_input() {
    let blob = sample_v1().serialize();
    let out = migrate("up", &blob[..blob.len() - 1]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn binary_requires_a_direction() {
    let out = migrate("sideways", &[]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}
