//! Fuzz target for callback admission bodies.
//!
//! Run with: cargo +nightly fuzz run fuzz_admit_request
//!
//! Decodes arbitrary bytes as an admission request and, when that succeeds,
//! substitutes the node key into the control daemon template.

#![no_main]

use std::path::Path;

use admitgate_core::{AdmitRequest, TrustSource};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = serde_json::from_slice::<AdmitRequest>(data) {
        let source = TrustSource::control_daemon(Path::new("/run/control.sock"));
        let target = source
            .resolve(&req.node_public)
            .expect("control daemon template always resolves");
        assert!(target.path_and_query().starts_with("/localapi/v0/whois?addr="));
    }
});
