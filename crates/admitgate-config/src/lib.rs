#![deny(unsafe_code)]

//! Configuration loading, validation, and bootstrap for admitgate.
//!
//! The gateway reads a small JSON document at start-up. [`Config::load_or_create`]
//! implements the bootstrap contract: a missing file is replaced with the
//! documented defaults, an existing file must parse or start-up fails.
//! Validation runs after command-line overrides are applied.

/// Redacted, zeroizing shared-secret type.
pub mod secret;

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use secret::Secret;

/// Placeholder substituted with the query-escaped node key in every trust
/// source template.
pub const NODE_KEY_PLACEHOLDER: &str = "{nodekey}";

/// Reserved host naming the local control daemon in trust source templates.
///
/// Templates with this host are routed over the control socket instead of the
/// network.
pub const CONTROL_HOST: &str = "local-tailscaled.sock";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Which admission protocol the listener speaks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// `GET /?secret=..&nodekey=..`, decision carried by the status code.
    Direct,
    /// `POST /` with a JSON body, decision carried in `{"Allow": bool}`.
    #[default]
    Callback,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Direct => f.write_str("direct"),
            Protocol::Callback => f.write_str("callback"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Protocol::Direct),
            "callback" => Ok(Protocol::Callback),
            other => Err(ConfigError::Validation(format!(
                "protocol must be \"direct\" or \"callback\", got {other:?}"
            ))),
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at start-up and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Address the admission listener binds to (`host:port` or `:port`).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path of the control daemon's local socket (or named pipe on Windows).
    #[serde(default = "default_unix_sock_addr")]
    pub unix_sock_addr: String,

    /// Ordered trust source URL templates. The first to grant wins.
    #[serde(default = "default_trust_sources")]
    pub trust_sources: Vec<String>,

    /// Admission protocol served on the listener.
    #[serde(default)]
    pub protocol: Protocol,

    /// Shared secret required by the direct protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<Secret>,

    /// Deadline for each trust source query, in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// Log filter used when `RUST_LOG` is unset (e.g. "info", "debug").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            unix_sock_addr: default_unix_sock_addr(),
            trust_sources: default_trust_sources(),
            protocol: Protocol::default(),
            secret_key: None,
            upstream_timeout_ms: default_upstream_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8081".to_string()
}

fn default_unix_sock_addr() -> String {
    default_control_socket()
}

fn default_trust_sources() -> Vec<String> {
    vec![format!(
        "http://{CONTROL_HOST}/localapi/v0/whois?addr={NODE_KEY_PLACEHOLDER}"
    )]
}

fn default_upstream_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The platform's conventional control daemon socket path.
pub fn default_control_socket() -> String {
    if cfg!(windows) {
        return r"\\.\pipe\ProtectedPrefix\Administrators\Tailscale\tailscaled".to_string();
    }
    if cfg!(target_os = "macos") {
        return "/var/run/tailscaled.socket".to_string();
    }
    if Path::new("/var/run").is_dir() {
        return "/var/run/tailscale/tailscaled.sock".to_string();
    }
    "tailscaled.sock".to_string()
}

impl Config {
    /// Load configuration from an existing JSON file using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON string. Absent keys take
    /// their defaults.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config = Self::from_json(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize without validating.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load the config at `path`, or write the defaults there if it is missing.
    ///
    /// When the file does not exist the in-memory defaults are returned without
    /// re-reading what was written; a failed write only logs a warning. Any
    /// error reading or parsing an existing file is returned. The result is not
    /// validated; call [`Config::validate`] once overrides are applied.
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::metadata(path).await {
            Ok(_) => {
                let content = tokio::fs::read_to_string(path).await?;
                Self::from_json(&content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let config = Config::default();
                let rendered = serde_json::to_string_pretty(&config)?;
                match tokio::fs::write(path, rendered).await {
                    Ok(()) => info!(path = %path.display(), "Created config file"),
                    Err(e) => warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not write default config, continuing with defaults"
                    ),
                }
                Ok(config)
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "listenAddr must not be empty".to_string(),
            ));
        }
        match self.listen_addr.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "listenAddr must be host:port or :port, got {:?}",
                    self.listen_addr
                )));
            }
        }
        if self.unix_sock_addr.is_empty() {
            return Err(ConfigError::Validation(
                "unixSockAddr must not be empty".to_string(),
            ));
        }
        if self.trust_sources.is_empty() {
            return Err(ConfigError::Validation(
                "trustSources must contain at least one template".to_string(),
            ));
        }
        for (i, template) in self.trust_sources.iter().enumerate() {
            validate_template(template)
                .map_err(|msg| ConfigError::Validation(format!("trustSources[{i}]: {msg}")))?;
        }
        if self.protocol == Protocol::Direct
            && self.secret_key.as_ref().is_none_or(|s| s.is_empty())
        {
            return Err(ConfigError::Validation(
                "secretKey is required when protocol is \"direct\"".to_string(),
            ));
        }
        if self.upstream_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "upstreamTimeoutMs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The listen address in a form `TcpListener::bind` accepts.
    ///
    /// A bare `:port` binds all interfaces.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }

    /// Per-query deadline for trust sources.
    pub fn upstream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.upstream_timeout_ms)
    }
}

fn validate_template(template: &str) -> Result<(), String> {
    let count = template.matches(NODE_KEY_PLACEHOLDER).count();
    if count != 1 {
        return Err(format!(
            "template must contain exactly one {NODE_KEY_PLACEHOLDER} placeholder, found {count}"
        ));
    }
    let probe = template.replace(NODE_KEY_PLACEHOLDER, "probe");
    let url = url::Url::parse(&probe).map_err(|e| format!("invalid URL {template:?}: {e}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {other:?}")),
    }
    match url.host_str() {
        None | Some("") => Err(format!("URL {template:?} has no host")),
        Some(CONTROL_HOST) if url.scheme() != "http" => {
            Err(format!("{CONTROL_HOST} sources must use plain http"))
        }
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8081");
        assert_eq!(
            config.trust_sources,
            vec!["http://local-tailscaled.sock/localapi/v0/whois?addr={nodekey}".to_string()]
        );
        assert_eq!(config.protocol, Protocol::Callback);
        assert!(config.secret_key.is_none());
        assert_eq!(config.upstream_timeout_ms, 5_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_minimal_json() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8081");
        assert_eq!(config.trust_sources.len(), 1);
    }

    #[test]
    fn test_parse_original_schema() {
        let json = r#"{
            "listenAddr": "0.0.0.0:9000",
            "unixSockAddr": "/tmp/tailscaled.sock",
            "trustSources": [
                "http://local-tailscaled.sock/localapi/v0/whois?addr={nodekey}",
                "https://trust.example.com/check?key={nodekey}"
            ]
        }"#;
        let config = Config::parse(json).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.unix_sock_addr, "/tmp/tailscaled.sock");
        assert_eq!(config.trust_sources.len(), 2);
        assert_eq!(config.protocol, Protocol::Callback);
    }

    #[test]
    fn test_parse_direct_protocol() {
        let json = r#"{"protocol": "direct", "secretKey": "s3cret", "upstreamTimeoutMs": 250}"#;
        let config = Config::parse(json).unwrap();
        assert_eq!(config.protocol, Protocol::Direct);
        assert_eq!(config.secret_key.as_ref().unwrap().expose(), "s3cret");
        assert_eq!(config.upstream_timeout().as_millis(), 250);
    }

    #[test]
    fn test_validation_rejects_direct_without_secret() {
        assert!(Config::parse(r#"{"protocol": "direct"}"#).is_err());
        assert!(Config::parse(r#"{"protocol": "direct", "secretKey": ""}"#).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_trust_sources() {
        let result = Config::parse(r#"{"trustSources": []}"#);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_missing_placeholder() {
        let result = Config::parse(r#"{"trustSources": ["http://example.com/check"]}"#);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_double_placeholder() {
        let result = Config::parse(
            r#"{"trustSources": ["http://example.com/{nodekey}?k={nodekey}"]}"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_non_http_scheme() {
        let result = Config::parse(r#"{"trustSources": ["ftp://example.com/{nodekey}"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_https_control_host() {
        let result = Config::parse(
            r#"{"trustSources": ["https://local-tailscaled.sock/localapi/v0/whois?addr={nodekey}"]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_bad_listen_addr() {
        assert!(Config::parse(r#"{"listenAddr": ""}"#).is_err());
        assert!(Config::parse(r#"{"listenAddr": "localhost"}"#).is_err());
        assert!(Config::parse(r#"{"listenAddr": "localhost:http"}"#).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        assert!(Config::parse(r#"{"upstreamTimeoutMs": 0}"#).is_err());
    }

    #[test]
    fn test_bind_addr_expands_bare_port() {
        let config = Config::parse(r#"{"listenAddr": ":8081"}"#).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8081");

        let config = Config::parse(r#"{"listenAddr": "127.0.0.1:9"}"#).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9");
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("direct".parse::<Protocol>().unwrap(), Protocol::Direct);
        assert_eq!("callback".parse::<Protocol>().unwrap(), Protocol::Callback);
        assert!("relay".parse::<Protocol>().is_err());
        assert_eq!(Protocol::Direct.to_string(), "direct");
    }

    #[test]
    fn test_secret_not_serialized_when_absent() {
        let rendered = serde_json::to_string(&Config::default()).unwrap();
        assert!(!rendered.contains("secretKey"));
        assert!(rendered.contains("\"listenAddr\""));
        assert!(rendered.contains("\"unixSockAddr\""));
        assert!(rendered.contains("\"trustSources\""));
    }

    // ── Bootstrap ─────────────────────────────────────────────────────

    #[test_log::test(tokio::test)]
    async fn test_load_or_create_writes_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");

        let config = Config::load_or_create(&path).await.unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8081");
        assert!(path.exists());

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let reparsed = Config::parse(&written).unwrap();
        assert_eq!(reparsed.listen_addr, config.listen_addr);
        assert_eq!(reparsed.unix_sock_addr, config.unix_sock_addr);
        assert_eq!(reparsed.trust_sources, config.trust_sources);
    }

    #[test_log::test(tokio::test)]
    async fn test_load_or_create_survives_unwritable_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing-dir").join("config.json");

        let config = Config::load_or_create(&path).await.unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8081");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_load_or_create_reads_existing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        tokio::fs::write(&path, br#"{"listenAddr": "0.0.0.0:4242"}"#)
            .await
            .unwrap();

        let config = Config::load_or_create(&path).await.unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:4242");
    }

    #[tokio::test]
    async fn test_load_or_create_defers_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        tokio::fs::write(&path, br#"{"protocol": "direct"}"#)
            .await
            .unwrap();

        let mut config = Config::load_or_create(&path).await.unwrap();
        assert!(config.validate().is_err());

        config.secret_key = Some(Secret::new("from-flag"));
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_load_or_create_rejects_invalid_existing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        tokio::fs::write(&path, b"not json {{{").await.unwrap();

        let result = Config::load_or_create(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        // The broken file is left untouched.
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "not json {{{");
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = Config::load(Path::new("/nonexistent/config.json")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
