use std::time::Duration;

use serde::Deserialize;

/// Settings used to build the default `reqwest`-backed executor.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportTuning {
    /// Per-attempt timeout in milliseconds; zero disables it.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Closes connections after each exchange instead of pooling them.
    pub disable_keep_alive: bool,
    /// Upper bound on idle pooled connections; zero means unbounded.
    pub max_idle_connections: usize,
    /// Maximum in-flight connections per host; zero means unbounded.
    pub max_connections_per_host: usize,
    /// Idle pooled connections kept per host.
    pub max_idle_connections_per_host: usize,
    pub tls: TlsOptions,
}

impl Default for TransportTuning {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            disable_keep_alive: false,
            max_idle_connections: 100,
            max_connections_per_host: 0,
            max_idle_connections_per_host: 10,
            tls: TlsOptions::default(),
        }
    }
}

impl TransportTuning {
    /// Idle connections the pool may keep for one host.
    pub(crate) fn idle_per_host(&self) -> usize {
        if self.disable_keep_alive {
            return 0;
        }
        match self.max_idle_connections {
            0 => self.max_idle_connections_per_host,
            cap => self.max_idle_connections_per_host.min(cap),
        }
    }
}

/// TLS settings for the default executor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsOptions {
    /// Accepts any server certificate. Only for testing against self-signed hosts.
    pub insecure_skip_verify: bool,
    /// Extra PEM-encoded root certificates.
    pub root_certificates: Vec<String>,
    pub min_version: Option<TlsVersion>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl From<TlsVersion> for reqwest::tls::Version {
    fn from(version: TlsVersion) -> Self {
        match version {
            TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
