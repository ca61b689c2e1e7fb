//! Blob fuzz target: arbitrary bytes through the client-layout decoder and the
//! update-message decoder. Errors are fine; panics are not.
//! Build with: cargo fuzz run blob_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SCHEMA: &str = r#"
schema fuzz version 1 {
    name: string(16) = "x";
    level: i32 = -1 [-100..100];
    big: u128;
    mode: enum Mode { A default, B, C };
    on: bool;
}
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let Ok(schema) = confgen::parse(SCHEMA) else {
        return;
    };
    let layout = confgen::ClientLayout::from_schema(&schema);
    if let Ok(config) = layout.decode(data) {
        let again = layout.encode(&config).unwrap();
        assert_eq!(layout.decode(&again).unwrap(), config);
    }
    let _ = layout.decode_update(data);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run blob_fuzz");
}
