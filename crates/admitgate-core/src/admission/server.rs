//! Admission router and server loop.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;

use admitgate_config::Protocol;

use super::callback::handle_callback;
use super::direct::handle_direct;
use crate::auth::Authenticator;
use crate::resolver::Resolver;

/// Shared state for the admission handlers. Immutable once built.
pub struct AdmissionState {
    pub protocol: Protocol,
    pub auth: Authenticator,
    pub resolver: Resolver,
}

/// Build the router for the configured protocol.
///
/// Both protocols answer on `/`; other methods get 405 from axum.
pub fn router(state: Arc<AdmissionState>) -> axum::Router {
    let route = match state.protocol {
        Protocol::Direct => get(handle_direct),
        Protocol::Callback => post(handle_callback),
    };
    axum::Router::new().route("/", route).with_state(state)
}

/// Serve admission requests on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AdmissionState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let protocol = state.protocol;
    info!(addr = %listener.local_addr()?, %protocol, "Admission server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Admission server stopped");
    Ok(())
}
