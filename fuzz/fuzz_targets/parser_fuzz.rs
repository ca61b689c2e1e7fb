//! Parser fuzz target: feed arbitrary text to the schema parser, then lint and
//! generate from whatever parses. Nothing on this path may panic.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(schema) = confgen::parse(s) {
        let _ = confgen::lint::lint(&schema);
        let _ = confgen::generate_device(&schema, confgen::DeviceMode::Full);
        let _ = confgen::generate_client(&schema);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
