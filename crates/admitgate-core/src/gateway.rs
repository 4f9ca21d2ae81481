//! Gateway process: wires config, upstream client, and admission server.

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use admitgate_config::{Config, ConfigError, Protocol};

use crate::admission::{self, AdmissionState};
use crate::auth::Authenticator;
use crate::resolver::Resolver;
use crate::source::SourceError;
use crate::upstream::{Upstream, UpstreamClient, UpstreamError};

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The admission gateway.
pub struct Gateway {
    config: Config,
    state: Arc<AdmissionState>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Gateway {
    /// Build a gateway that queries trust sources with a fresh [`UpstreamClient`].
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        let upstream = Arc::new(UpstreamClient::new(config.upstream_timeout())?);
        Self::with_upstream(config, upstream)
    }

    /// Build a gateway around an existing upstream client. The config is
    /// validated first.
    ///
    /// The direct protocol consults only the control daemon; the callback
    /// protocol walks every configured trust source.
    pub fn with_upstream(config: Config, upstream: Arc<dyn Upstream>) -> Result<Self, GatewayError> {
        config.validate()?;
        let resolver = match config.protocol {
            Protocol::Direct => {
                Resolver::control_daemon(Path::new(&config.unix_sock_addr), upstream)
            }
            Protocol::Callback => Resolver::from_config(&config, upstream)?,
        };
        let state = Arc::new(AdmissionState {
            protocol: config.protocol,
            auth: Authenticator::from_config(&config),
            resolver,
        });
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            config,
            state,
            shutdown_tx,
        })
    }

    /// Bind the configured listen address and serve until shut down.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until [`shutdown`](Self::shutdown)
    /// is called or Ctrl-C is received.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        info!(
            version = crate::build_info::LONG_VERSION,
            control_socket = %self.config.unix_sock_addr,
            sources = self.state.resolver.sources().len(),
            "admitgate starting"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown_tx = self.shutdown_tx.clone();
        let shutdown = async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Ctrl-C received, initiating graceful shutdown");
                    let _ = shutdown_tx.send(ShutdownSignal);
                }
            }
        };

        admission::serve(listener, Arc::clone(&self.state), shutdown).await?;
        Ok(())
    }

    /// Request a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    /// The router serving this gateway's protocol, for in-process use.
    pub fn router(&self) -> axum::Router {
        admission::router(Arc::clone(&self.state))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Errors from the gateway runtime. All of them are fatal at start-up.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("invalid trust source: {0}")]
    Source(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
