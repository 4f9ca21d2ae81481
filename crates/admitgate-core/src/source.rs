//! Trust source templates and per-request query targets.

use std::path::Path;

use admitgate_config::{CONTROL_HOST, NODE_KEY_PLACEHOLDER};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use crate::transport::Transport;

/// Errors building or resolving a trust source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid trust source URL {template:?}: {reason}")]
    InvalidUrl { template: String, reason: String },

    #[error("trust source {0:?} has no host")]
    MissingHost(String),

    #[error("node key {node_key:?} would form a dot segment in {template:?}")]
    DotSegment { template: String, node_key: String },
}

/// Bytes left unescaped in a query component: ASCII alphanumerics and `-_.~`.
const QUERY_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Escape `s` for a URL query component. Spaces become `+`; every byte outside
/// [`QUERY_UNRESERVED`] is percent-encoded.
pub fn query_escape(s: &str) -> String {
    s.split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_UNRESERVED).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Whether substituting `escaped` into `template` yields a whole `.` or `..`
/// path segment. URL parsing collapses those, which would query another path.
fn forms_dot_segment(template: &str, escaped: &str) -> bool {
    if escaped != "." && escaped != ".." {
        return false;
    }
    let Some(at) = template.find(NODE_KEY_PLACEHOLDER) else {
        return false;
    };
    let before = &template[..at];
    let after = &template[at + NODE_KEY_PLACEHOLDER.len()..];
    let in_path = before
        .split_once("://")
        .is_some_and(|(_, rest)| rest.contains('/') && !rest.contains(['?', '#']));
    in_path
        && before.ends_with(['/', '\\'])
        && (after.is_empty() || after.starts_with(['/', '\\', '?', '#']))
}

/// A URL template consulted to decide whether a node key is trusted.
#[derive(Debug, Clone)]
pub struct TrustSource {
    template: String,
    transport: Transport,
}

/// A fully resolved query for one node key against one trust source.
#[derive(Debug, Clone)]
pub struct Target {
    pub transport: Transport,
    pub url: Url,
    /// Value sent in the `Host` header: the URL authority, which for local
    /// sources is the reserved control host rather than anything dialable.
    pub host: String,
}

impl TrustSource {
    /// Build a source from a validated template, binding its transport.
    pub fn from_template(
        template: impl Into<String>,
        control_socket: &Path,
    ) -> Result<Self, SourceError> {
        let template = template.into();
        let probe = template.replace(NODE_KEY_PLACEHOLDER, "probe");
        let url = Url::parse(&probe).map_err(|e| SourceError::InvalidUrl {
            template: template.clone(),
            reason: e.to_string(),
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| SourceError::MissingHost(template.clone()))?;
        let transport = Transport::for_host(host, control_socket);
        Ok(Self {
            template,
            transport,
        })
    }

    /// The control daemon's `whois` endpoint reached over `control_socket`.
    pub fn control_daemon(control_socket: &Path) -> Self {
        Self {
            template: format!(
                "http://{CONTROL_HOST}/localapi/v0/whois?addr={NODE_KEY_PLACEHOLDER}"
            ),
            transport: Transport::Local(control_socket.to_path_buf()),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Substitute the query-escaped node key and parse the result.
    ///
    /// Fails with [`SourceError::DotSegment`] for a `.` or `..` key placed as a
    /// whole path segment.
    pub fn resolve(&self, node_key: &str) -> Result<Target, SourceError> {
        let escaped = query_escape(node_key);
        if forms_dot_segment(&self.template, &escaped) {
            return Err(SourceError::DotSegment {
                template: self.template.clone(),
                node_key: node_key.to_string(),
            });
        }
        let raw = self.template.replace(NODE_KEY_PLACEHOLDER, &escaped);
        let url = Url::parse(&raw).map_err(|e| SourceError::InvalidUrl {
            template: self.template.clone(),
            reason: e.to_string(),
        })?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(port)) => format!("{h}:{port}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(SourceError::MissingHost(self.template.clone())),
        };
        Ok(Target {
            transport: self.transport.clone(),
            url,
            host,
        })
    }
}

impl Target {
    /// Origin-form request target (`/path?query`) for requests sent over an
    /// already-open connection.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{q}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }
}

/// Build the ordered source list from config templates.
pub fn sources_from_config(
    config: &admitgate_config::Config,
) -> Result<Vec<TrustSource>, SourceError> {
    let socket = Path::new(&config.unix_sock_addr);
    config
        .trust_sources
        .iter()
        .map(|t| TrustSource::from_template(t.as_str(), socket))
        .collect()
}
