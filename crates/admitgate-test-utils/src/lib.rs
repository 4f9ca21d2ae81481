#![deny(unsafe_code)]

//! Shared test utilities for the admitgate workspace.
//!
//! Provides config builders, stub trust sources, log capture, and tracing
//! helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! admitgate-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod log_capture;
pub mod stub;
pub mod tracing_setup;
