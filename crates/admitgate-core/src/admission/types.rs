//! Wire types for the admission protocols.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Maximum accepted size of a callback request body.
pub const MAX_BODY_BYTES: usize = 8 * 1024;

/// Query parameters of the direct protocol (`GET /?secret=..&nodekey=..`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectQuery {
    pub secret: String,
    pub nodekey: String,
}

impl DirectQuery {
    /// Decode a raw query string. Absent parameters are empty; for repeated
    /// ones the first occurrence wins.
    pub fn from_query(raw: &str) -> Self {
        let mut secret = None;
        let mut nodekey = None;
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match &*key {
                "secret" if secret.is_none() => secret = Some(value.into_owned()),
                "nodekey" if nodekey.is_none() => nodekey = Some(value.into_owned()),
                _ => {}
            }
        }
        Self {
            secret: secret.unwrap_or_default(),
            nodekey: nodekey.unwrap_or_default(),
        }
    }
}

/// Body of a callback admission request sent by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmitRequest {
    /// Public key of the node asking to connect.
    #[serde(rename = "NodePublic", default)]
    pub node_public: String,

    /// The connecting client's IP address. Informational only.
    #[serde(rename = "Source", default, with = "optional_ip")]
    pub source: Option<IpAddr>,
}

/// Body of a callback admission response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmitResponse {
    #[serde(rename = "Allow")]
    pub allow: bool,
}

/// An IP address serialized as a string, where `""` or `null` means unknown.
mod optional_ip {
    use std::net::IpAddr;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(addr: &Option<IpAddr>, s: S) -> Result<S::Ok, S::Error> {
        match addr {
            Some(ip) => s.collect_str(ip),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<IpAddr>, D::Error> {
        match Option::<String>::deserialize(d)?.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}
