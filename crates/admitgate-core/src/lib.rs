#![deny(unsafe_code)]

//! admitgate core: admission control for relay/mesh peers.
//!
//! An inbound admission request is authenticated, its node key is checked
//! against an ordered chain of trust sources (the local control daemon and
//! optional remote HTTP endpoints), and the decision is written back in the
//! wire format of the protocol the gateway serves.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, used by traits consumed as
/// `dyn Trait` (native `async fn` in traits is not object-safe).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Direct and callback admission protocols (axum handlers and server).
pub mod admission;
/// Shared-secret caller authentication.
pub mod auth;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Gateway process: config → resolver → admission server.
pub mod gateway;
/// Ordered trust-source resolution.
pub mod resolver;
/// Trust source templates and resolved query targets.
pub mod source;
/// Control socket vs. network transport selection.
pub mod transport;
/// Outbound HTTP client for trust source queries.
pub mod upstream;

pub use admission::{AdmitRequest, AdmitResponse};
pub use gateway::{Gateway, GatewayError};
pub use resolver::Resolver;
pub use source::TrustSource;
pub use upstream::{Upstream, UpstreamClient};
