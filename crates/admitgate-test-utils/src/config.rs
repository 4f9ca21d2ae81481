//! Configuration builders for tests.

use admitgate_config::{Config, Protocol, Secret};

/// Fluent builder for [`Config`] in tests.
///
/// Starts from a config listening on an ephemeral localhost port with no
/// trust sources; add them with [`trust_source`](Self::trust_source).
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .direct("s3cret")
///     .control_socket(stub.socket_path().unwrap())
///     .trust_source(&stub.template())
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: Config,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let config = Config {
            listen_addr: "127.0.0.1:0".to_string(),
            trust_sources: Vec::new(),
            upstream_timeout_ms: 2_000,
            ..Config::default()
        };
        Self { config }
    }

    pub fn listen_addr(mut self, addr: &str) -> Self {
        self.config.listen_addr = addr.to_string();
        self
    }

    pub fn control_socket(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.config.unix_sock_addr = path.as_ref().display().to_string();
        self
    }

    pub fn trust_source(mut self, template: &str) -> Self {
        self.config.trust_sources.push(template.to_string());
        self
    }

    /// Serve the direct protocol with the given shared secret.
    pub fn direct(mut self, secret: &str) -> Self {
        self.config.protocol = Protocol::Direct;
        self.config.secret_key = Some(Secret::new(secret));
        self
    }

    pub fn callback(mut self) -> Self {
        self.config.protocol = Protocol::Callback;
        self
    }

    pub fn upstream_timeout_ms(mut self, ms: u64) -> Self {
        self.config.upstream_timeout_ms = ms;
        self
    }

    /// Build the config. A source-less config gets the default control daemon
    /// template so that it validates.
    pub fn build(mut self) -> Config {
        if self.config.trust_sources.is_empty() {
            self.config.trust_sources = Config::default().trust_sources;
        }
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
