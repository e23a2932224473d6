//! Configuration system.
//!
//! Loads RDP configuration from JSON strings/files (file IO left to the
//! binary). Protocol timing constants are fixed by the spec (§6); they are
//! exposed here so tests can shrink them, but production code should always
//! use [`RdpConfig::default`] so peers stay consistent.

use serde::{Deserialize, Serialize};

/// Root configuration shared by client and server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdpConfig {
    /// Server listen address, e.g. `0.0.0.0:8000`.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    /// How often the client resends outstanding requests, in milliseconds.
    #[serde(default = "default_retransmit_interval_ms")]
    pub retransmit_interval_ms: u64,
    /// How long a client waits for a response before failing with `Timeout`.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
    /// How long the server remembers a reply for dedup purposes.
    #[serde(default = "default_dedup_lifetime_secs")]
    pub dedup_lifetime_secs: u64,
}

fn default_server_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_retransmit_interval_ms() -> u64 {
    500
}

fn default_response_timeout_secs() -> u64 {
    6
}

fn default_dedup_lifetime_secs() -> u64 {
    30
}

impl Default for RdpConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            retransmit_interval_ms: default_retransmit_interval_ms(),
            response_timeout_secs: default_response_timeout_secs(),
            dedup_lifetime_secs: default_dedup_lifetime_secs(),
        }
    }
}

impl RdpConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn retransmit_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retransmit_interval_ms)
    }

    pub fn response_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.response_timeout_secs)
    }

    pub fn dedup_lifetime(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dedup_lifetime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = RdpConfig::default();
        assert_eq!(cfg.retransmit_interval_ms, 500);
        assert_eq!(cfg.response_timeout_secs, 6);
        assert_eq!(cfg.dedup_lifetime_secs, 30);
        assert_eq!(cfg.server_addr, "0.0.0.0:8000");
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let cfg = RdpConfig::from_json_str(r#"{"server_addr": "127.0.0.1:9000"}"#).unwrap();
        assert_eq!(cfg.server_addr, "127.0.0.1:9000");
        assert_eq!(cfg.response_timeout_secs, 6);
    }
}
