//! Outbound HTTP client for trust source queries.
//!
//! [`UpstreamClient`] is constructed once by the gateway and shared by every
//! resolver. Local targets are queried with `hyper` over the control socket;
//! network targets go through a pooled `reqwest` client. Every query is bounded
//! by the configured deadline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use http_body_util::Empty;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use tracing::debug;

use crate::BoxFuture;
use crate::source::Target;
use crate::transport::{self, Transport};

/// Header marking a request as a control-plane query.
pub const REASON_HEADER: &str = "X-Tailscale-Reason";

/// Errors from a single trust source query. The resolver treats all of them
/// as a declined source.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to connect to control socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP handshake failed: {0}")]
    Handshake(hyper::Error),

    #[error("request failed: {0}")]
    Request(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Issues a `GET` for a resolved target and reports the response status.
///
/// Implementations must be `Send + Sync`; the resolver holds them behind an
/// `Arc<dyn Upstream>`.
pub trait Upstream: Send + Sync {
    fn query<'a>(&'a self, target: &'a Target) -> BoxFuture<'a, Result<StatusCode, UpstreamError>>;
}

/// The production [`Upstream`]: control socket or network, per target.
pub struct UpstreamClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    /// Create a client applying `timeout` to each query.
    ///
    /// Network sources are dialed directly; proxy environment variables are
    /// ignored.
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn query_local(&self, socket: &Path, target: &Target) -> Result<StatusCode, UpstreamError> {
        let stream = transport::connect_local(socket)
            .await
            .map_err(|e| UpstreamError::Connect {
                path: socket.to_path_buf(),
                source: e,
            })?;

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(TokioIo::new(stream))
                .await
                .map_err(UpstreamError::Handshake)?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "Control socket connection closed with error");
            }
        });

        let req = hyper::Request::get(target.path_and_query())
            .header(HOST, &target.host)
            .header(REASON_HEADER, "")
            .body(Empty::new())
            .map_err(|e| UpstreamError::Request(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(resp.status())
    }

    async fn query_network(&self, target: &Target) -> Result<StatusCode, UpstreamError> {
        let resp = self
            .http
            .get(target.url.clone())
            .header(HOST, &target.host)
            .header(REASON_HEADER, "")
            .send()
            .await?;
        Ok(resp.status())
    }
}

impl Upstream for UpstreamClient {
    fn query<'a>(&'a self, target: &'a Target) -> BoxFuture<'a, Result<StatusCode, UpstreamError>> {
        Box::pin(async move {
            let call = async {
                match &target.transport {
                    Transport::Local(socket) => self.query_local(socket, target).await,
                    Transport::Network => self.query_network(target).await,
                }
            };
            tokio::time::timeout(self.timeout, call)
                .await
                .map_err(|_| UpstreamError::Timeout(self.timeout))?
        })
    }
}
