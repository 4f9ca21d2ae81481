//! Transport selection for trust source queries.
//!
//! Each trust source is bound to a [`Transport`] once, when the config is
//! loaded. Sources addressed to the reserved control host speak HTTP over the
//! control daemon's local socket; everything else goes over the network.
//! Dial errors are returned as-is and never retried.

use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
pub type LocalStream = tokio::net::UnixStream;

#[cfg(windows)]
pub type LocalStream = tokio::net::windows::named_pipe::NamedPipeClient;

/// How a trust source is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// HTTP over the control daemon's Unix socket (named pipe on Windows).
    Local(PathBuf),
    /// Ordinary TCP/TLS connection to the URL's host.
    Network,
}

impl Transport {
    /// Pick the transport for a URL host: the reserved control host maps to the
    /// local socket at `control_socket`, any other host to the network.
    pub fn for_host(host: &str, control_socket: &Path) -> Self {
        if host == admitgate_config::CONTROL_HOST {
            Transport::Local(control_socket.to_path_buf())
        } else {
            Transport::Network
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Transport::Local(_))
    }
}

/// Open a stream to the control daemon at `path`.
#[cfg(unix)]
pub async fn connect_local(path: &Path) -> io::Result<LocalStream> {
    tokio::net::UnixStream::connect(path).await
}

/// Open a stream to the control daemon at `path`.
#[cfg(windows)]
pub async fn connect_local(path: &Path) -> io::Result<LocalStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}
