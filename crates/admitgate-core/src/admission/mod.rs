//! Admission protocols served to relays and other callers.
//!
//! ```text
//! ┌──────────────┐  GET /?secret&nodekey   ┌──────────────┐   whois    ┌──────────────┐
//! │ direct caller│────────────────────────▶│              │───────────▶│   control    │
//! └──────────────┘                         │  admission   │  (socket)  │   daemon     │
//! ┌──────────────┐  POST / {NodePublic}    │   router     │            └──────────────┘
//! │    relay     │────────────────────────▶│   (axum)     │───────────▶ remote trust
//! └──────────────┘                         └──────────────┘  (network)   sources
//! ```
//!
//! The two protocols deliberately differ in how a denial is signalled: the
//! direct protocol answers 403, the callback protocol answers 200 with
//! `{"Allow": false}`.

mod callback;
mod direct;
pub mod server;
pub mod types;

pub use server::{AdmissionState, router, serve};
pub use types::*;
