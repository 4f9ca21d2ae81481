//! Callback protocol: `POST /` with `{"NodePublic": .., "Source": ..}`.
//!
//! Used by a relay asking, per connecting client, whether to admit it. The
//! response is always 200 with `{"Allow": bool}` once the body decodes; only
//! a failure to encode that response yields 500.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, Limited};
use tracing::{debug, error, info, warn};

use super::server::AdmissionState;
use super::types::{AdmitRequest, AdmitResponse, MAX_BODY_BYTES};

pub(super) async fn handle_callback(
    State(state): State<Arc<AdmissionState>>,
    body: Body,
) -> Response {
    let raw = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, limit = MAX_BODY_BYTES, "Error while reading request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let req: AdmitRequest = match serde_json::from_slice(&raw) {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "Error while parsing request");
            debug!(body = %String::from_utf8_lossy(&raw), "Rejected request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let source = req
        .source
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let allow = state.resolver.verify(&req.node_public).await;
    if allow {
        info!(node_key = %req.node_public, %source, "Granted relay access");
    } else {
        info!(node_key = %req.node_public, %source, "Relay access denied by all trust sources");
    }

    encode(&AdmitResponse { allow })
}

fn encode(resp: &AdmitResponse) -> Response {
    match serde_json::to_vec(resp) {
        Ok(bytes) => (StatusCode::OK, [(CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode admission response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;
    use crate::admission::server::router;
    use crate::auth::Authenticator;
    use crate::resolver::Resolver;
    use crate::resolver::tests::ScriptedUpstream;
    use crate::source::TrustSource;
    use admitgate_config::Protocol;
    use admitgate_test_utils::log_capture::LogCapture;

    fn app(answers: &[(&str, u16)]) -> (axum::Router, Arc<ScriptedUpstream>) {
        let upstream = Arc::new(ScriptedUpstream::with(answers));
        let sources = ["first.test", "second.test", "third.test"]
            .iter()
            .map(|h| {
                TrustSource::from_template(format!("http://{h}/?k={{nodekey}}"), Path::new("/s"))
                    .unwrap()
            })
            .collect();
        let state = Arc::new(AdmissionState {
            protocol: Protocol::Callback,
            auth: Authenticator::Open,
            resolver: Resolver::new(sources, upstream.clone()),
        });
        (router(state), upstream)
    }

    async fn post(router: axum::Router, body: impl Into<Body>) -> Response {
        let req = Request::post("/")
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        router.oneshot(req).await.unwrap()
    }

    async fn decision(resp: Response) -> bool {
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let decoded: AdmitResponse = serde_json::from_slice(&body).unwrap();
        decoded.allow
    }

    const BODY: &str = r#"{"NodePublic": "nodekey:abc", "Source": "100.64.0.9"}"#;

    #[tokio::test]
    async fn test_first_source_grants() {
        let (router, upstream) = app(&[("first.test", 200), ("second.test", 200)]);
        assert!(decision(post(router, BODY).await).await);
        assert_eq!(upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_later_source_grants_and_stops_chain() {
        let (router, upstream) = app(&[("first.test", 403), ("second.test", 200), ("third.test", 200)]);
        assert!(decision(post(router, BODY).await).await);
        assert_eq!(
            upstream.calls(),
            vec![
                "http://first.test/?k=nodekey%3Aabc",
                "http://second.test/?k=nodekey%3Aabc"
            ]
        );
    }

    #[tokio::test]
    async fn test_all_decline_is_allow_false() {
        // third.test is unscripted, so it errors like an unreachable source.
        let (router, upstream) = app(&[("first.test", 401), ("second.test", 500)]);
        assert!(!decision(post(router, BODY).await).await);
        assert_eq!(upstream.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_response_is_json() {
        let (router, _) = app(&[("first.test", 200)]);
        let resp = post(router, BODY).await;
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"Allow":true}"#);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        for body in [
            "",
            "{",
            "[1,2]",
            "null",
            r#"{"NodePublic": 7}"#,
            r#"{"Source": "nope"}"#,
            r#"{"NodePublic": "k"} trailing"#,
            r#"{"NodePublic": "k"}{"NodePublic": "j"}"#,
        ] {
            let (router, upstream) = app(&[("first.test", 200)]);
            let resp = post(router, body).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body:?}");
            assert!(upstream.calls().is_empty(), "{body:?}");
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_bad_request() {
        let padding = "x".repeat(MAX_BODY_BYTES);
        let body = format!(r#"{{"NodePublic": "{padding}"}}"#);
        let (router, upstream) = app(&[("first.test", 200)]);
        let resp = post(router, body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_body_at_limit_is_accepted() {
        let prefix = r#"{"NodePublic": ""#;
        let suffix = r#""}"#;
        let key = "k".repeat(MAX_BODY_BYTES - prefix.len() - suffix.len());
        let body = format!("{prefix}{key}{suffix}");
        assert_eq!(body.len(), MAX_BODY_BYTES);

        let (router, _) = app(&[("first.test", 200)]);
        assert!(decision(post(router, body).await).await);
    }

    #[tokio::test]
    async fn test_get_not_allowed() {
        for method in ["GET", "PUT", "DELETE"] {
            let (router, upstream) = app(&[("first.test", 200)]);
            let req = Request::builder()
                .method(method)
                .uri("/")
                .body(Body::empty())
                .unwrap();
            let resp = router.oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert!(upstream.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_repeated_requests_same_decision() {
        let (router, _) = app(&[("first.test", 404), ("second.test", 200)]);
        for _ in 0..3 {
            assert!(decision(post(router.clone(), BODY).await).await);
        }
    }

    #[tokio::test]
    async fn test_outcomes_are_logged() {
        let capture = LogCapture::new();
        let _guard = capture.set_default();

        let (granting, _) = app(&[("first.test", 200)]);
        post(granting, BODY).await;
        assert!(capture.contains("Granted relay access node_key=nodekey:abc source=100.64.0.9"));

        let (declining, _) = app(&[]);
        post(declining, r#"{"NodePublic": "nk-x"}"#).await;
        assert!(capture.contains(
            "Relay access denied by all trust sources node_key=nk-x source=unknown"
        ));
    }

    #[test]
    fn test_encode_ok() {
        let resp = encode(&AdmitResponse { allow: false });
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
