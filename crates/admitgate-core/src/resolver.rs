//! Ordered trust-source resolution.
//!
//! [`Resolver::verify`] walks the sources in configured order and grants on
//! the first HTTP 200. A non-200 status, a transport error, or a timeout
//! counts as that source declining; resolution moves on to the next one.
//! Sources are queried sequentially and later sources are never contacted
//! once one grants.

use std::path::Path;
use std::sync::Arc;

use hyper::StatusCode;
use tracing::debug;

use crate::source::{self, SourceError, TrustSource};
use crate::upstream::Upstream;

/// Evaluates a node key against an ordered chain of trust sources.
#[derive(Clone)]
pub struct Resolver {
    sources: Arc<[TrustSource]>,
    upstream: Arc<dyn Upstream>,
}

impl Resolver {
    pub fn new(sources: Vec<TrustSource>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            sources: sources.into(),
            upstream,
        }
    }

    /// A resolver over every configured trust source, in order.
    pub fn from_config(
        config: &admitgate_config::Config,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self, SourceError> {
        Ok(Self::new(source::sources_from_config(config)?, upstream))
    }

    /// A resolver consulting only the control daemon at `control_socket`.
    pub fn control_daemon(control_socket: &Path, upstream: Arc<dyn Upstream>) -> Self {
        Self::new(vec![TrustSource::control_daemon(control_socket)], upstream)
    }

    pub fn sources(&self) -> &[TrustSource] {
        &self.sources
    }

    /// Whether any source grants `node_key`. Never fails: errors are declines.
    pub async fn verify(&self, node_key: &str) -> bool {
        for (index, source) in self.sources.iter().enumerate() {
            let target = match source.resolve(node_key) {
                Ok(target) => target,
                Err(e) => {
                    debug!(index, error = %e, "Trust source could not be resolved");
                    continue;
                }
            };

            match self.upstream.query(&target).await {
                Ok(status) if status == StatusCode::OK => {
                    debug!(index, source = source.template(), "Trust source granted");
                    return true;
                }
                Ok(status) => {
                    debug!(index, %status, source = source.template(), "Trust source declined");
                }
                Err(e) => {
                    debug!(index, error = %e, source = source.template(), "Trust source unreachable");
                }
            }
        }
        false
    }
}
