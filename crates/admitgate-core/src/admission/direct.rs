//! Direct protocol: `GET /?secret=<s>&nodekey=<k>`.
//!
//! The status code is the decision: 200 granted, 403 bad secret or denied,
//! 400 for an empty node key. A malformed request target never reaches the
//! handler; hyper answers it with 400. Repeated parameters are not an error,
//! the first occurrence wins.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use tracing::{info, warn};

use super::server::AdmissionState;
use super::types::DirectQuery;

pub(super) async fn handle_direct(
    State(state): State<Arc<AdmissionState>>,
    RawQuery(raw): RawQuery,
) -> StatusCode {
    let query = DirectQuery::from_query(raw.as_deref().unwrap_or_default());

    if !state.auth.check(&query.secret) {
        warn!(secret_len = query.secret.len(), "Invalid secret");
        return StatusCode::FORBIDDEN;
    }

    if query.nodekey.is_empty() {
        warn!("Node key is empty");
        return StatusCode::BAD_REQUEST;
    }

    if state.resolver.verify(&query.nodekey).await {
        info!(node_key = %query.nodekey, "Access granted");
        StatusCode::OK
    } else {
        info!(node_key = %query.nodekey, "Access denied");
        StatusCode::FORBIDDEN
    }
}
