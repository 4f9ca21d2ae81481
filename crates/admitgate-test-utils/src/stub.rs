//! Stub trust sources.
//!
//! [`StubTrustSource`] serves a tiny axum app on a temporary Unix socket (to
//! stand in for the control daemon) or on an ephemeral TCP port (to stand in
//! for a remote trust source). It counts and records every request so tests
//! can assert on ordering and short-circuiting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::HOST;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// How the stub answers each query.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Always answer with this status code.
    Status(u16),
    /// 200 when any query value or the last path segment equals one of these
    /// keys, 404 otherwise.
    AllowKeys(Vec<String>),
    /// Never answer.
    Hang,
}

/// A request observed by the stub.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path_and_query: String,
    pub host: Option<String>,
    pub has_reason_header: bool,
}

struct StubState {
    behavior: StubBehavior,
    hits: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

enum Endpoint {
    Unix { path: PathBuf, _dir: TempDir },
    Tcp(std::net::SocketAddr),
}

/// A running stub trust source. The server task is aborted on drop.
pub struct StubTrustSource {
    endpoint: Endpoint,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubTrustSource {
    /// Serve on a fresh Unix socket inside a temp directory.
    #[cfg(unix)]
    pub async fn unix(behavior: StubBehavior) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("control.sock");
        let listener =
            tokio::net::UnixListener::bind(&path).expect("failed to bind stub control socket");
        let state = Self::state(behavior);
        let app = Self::router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            endpoint: Endpoint::Unix { path, _dir: dir },
            state,
            handle,
        }
    }

    /// Serve on an ephemeral localhost TCP port.
    pub async fn tcp(behavior: StubBehavior) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub listener");
        let addr = listener.local_addr().expect("stub listener has no address");
        let state = Self::state(behavior);
        let app = Self::router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            endpoint: Endpoint::Tcp(addr),
            state,
            handle,
        }
    }

    fn state(behavior: StubBehavior) -> Arc<StubState> {
        Arc::new(StubState {
            behavior,
            hits: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn router(state: Arc<StubState>) -> axum::Router {
        axum::Router::new().fallback(handle).with_state(state)
    }

    /// Socket path, for stubs started with [`StubTrustSource::unix`].
    pub fn socket_path(&self) -> Option<&Path> {
        match &self.endpoint {
            Endpoint::Unix { path, .. } => Some(path),
            Endpoint::Tcp(_) => None,
        }
    }

    /// `http://127.0.0.1:<port>`, for stubs started with [`StubTrustSource::tcp`].
    pub fn base_url(&self) -> Option<String> {
        match &self.endpoint {
            Endpoint::Tcp(addr) => Some(format!("http://{addr}")),
            Endpoint::Unix { .. } => None,
        }
    }

    /// A trust source template pointing at this stub. Unix stubs use the
    /// control daemon's `whois` path under the reserved host.
    pub fn template(&self) -> String {
        match &self.endpoint {
            Endpoint::Unix { .. } => format!(
                "http://{}/localapi/v0/whois?addr={}",
                admitgate_config::CONTROL_HOST,
                admitgate_config::NODE_KEY_PLACEHOLDER
            ),
            Endpoint::Tcp(addr) => format!(
                "http://{addr}/check?key={}",
                admitgate_config::NODE_KEY_PLACEHOLDER
            ),
        }
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Snapshot of all requests received so far.
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state
            .seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl Drop for StubTrustSource {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(State(state): State<Arc<StubState>>, req: Request) -> StatusCode {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let has_reason_header = req.headers().contains_key("x-tailscale-reason");

    if let Ok(mut seen) = state.seen.lock() {
        seen.push(SeenRequest {
            path_and_query,
            host,
            has_reason_header,
        });
    }

    match &state.behavior {
        StubBehavior::Status(code) => {
            StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        StubBehavior::AllowKeys(keys) => {
            let query_hit = req.uri().query().is_some_and(|q| {
                url::form_urlencoded::parse(q.as_bytes()).any(|(_, v)| keys.iter().any(|k| *k == v))
            });
            let path_hit = req
                .uri()
                .path()
                .rsplit('/')
                .next()
                .is_some_and(|seg| keys.iter().any(|k| k == seg));
            if query_hit || path_hit {
                StatusCode::OK
            } else {
                StatusCode::NOT_FOUND
            }
        }
        StubBehavior::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::GATEWAY_TIMEOUT
        }
    }
}
