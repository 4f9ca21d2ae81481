//! Caller authentication for admission requests.
//!
//! The direct protocol authenticates callers with a shared secret; the
//! callback protocol relies on the relay being the only client and performs
//! no authentication. A failed check never reaches the trust sources.

use admitgate_config::{Protocol, Secret};
use subtle::ConstantTimeEq;

/// How inbound admission requests are authenticated.
#[derive(Debug, Clone)]
pub enum Authenticator {
    /// The caller must present this secret.
    SharedSecret(Secret),
    /// Every caller is accepted.
    Open,
}

impl Authenticator {
    /// Shared-secret authentication for the direct protocol, open for the
    /// callback protocol whatever `secretKey` holds.
    pub fn from_config(config: &admitgate_config::Config) -> Self {
        match (config.protocol, &config.secret_key) {
            (Protocol::Direct, Some(secret)) => Authenticator::SharedSecret(secret.clone()),
            _ => Authenticator::Open,
        }
    }

    /// Check a presented credential in constant time with respect to its
    /// contents.
    pub fn check(&self, presented: &str) -> bool {
        match self {
            Authenticator::SharedSecret(secret) => {
                bool::from(secret.expose().as_bytes().ct_eq(presented.as_bytes()))
            }
            Authenticator::Open => true,
        }
    }
}
