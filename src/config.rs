//! Configuration types for torrent-export

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::SocketAddr, time::Duration};
use utoipa::ToSchema;

/// Main configuration
///
/// Fields are organized into sub-configs:
/// - [`api`](ApiConfig): bind address, accounts, CORS
/// - [`export`](ExportConfig): archive streaming behaviour
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Archive export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Reject settings the exporter cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.export.sink_buffer == 0 {
            return Err(Error::Config {
                message: "sink buffer must be at least one byte".to_string(),
                key: Some("export.sink_buffer".to_string()),
            });
        }
        Ok(())
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8090)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String, example = "127.0.0.1:8090")]
    pub bind_address: SocketAddr,

    /// HTTP Basic accounts, user name to password.
    ///
    /// Empty disables authentication on protected routes.
    #[serde(default)]
    pub accounts: HashMap<String, String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            accounts: HashMap::new(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Archive export configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExportConfig {
    /// Size of each read from a torrent file (default: 64 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Capacity of the pipe between the archive writer and the response body (default: 256 KiB)
    #[serde(default = "default_sink_buffer")]
    pub sink_buffer: usize,

    /// Upper bound for a single read while waiting on swarm data, in seconds.
    ///
    /// None leaves piece timeouts entirely to the engine.
    #[serde(default, with = "optional_duration_serde")]
    #[schema(value_type = Option<u64>)]
    pub read_timeout: Option<Duration>,
}

impl ExportConfig {
    /// Chunk size used for copying, never zero
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            sink_buffer: default_sink_buffer(),
            read_timeout: None,
        }
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8090))
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_sink_buffer() -> usize {
    256 * 1024
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
