//! Fuzz target for the JSON configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary documents through `Config::parse()`, which deserializes and
//! then validates every trust source template.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = admitgate_config::Config::parse(s);
    }
});
