//! # JSON Configuration
//!
//! Every tunable of the bridge lives in one JSON document. Each section is
//! optional and every field falls back to its default, so a file only needs
//! to name what it changes.
//!
//! ```json
//! {
//!   "timing": { "settle_ns": 500, "strobe_ns": 1000, "ack_timeout_ms": 100 },
//!   "protocol": { "echo_input": true },
//!   "serial": { "port": "/dev/ttyUSB0", "baud_rate": 62500 },
//!   "target": {
//!     "ack_latency_polls": 2,
//!     "preload": [{ "space": "memory", "address": 256, "data": [62, 66, 201] }]
//!   },
//!   "loader": { "chunk_size": 64, "max_retries": 5 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::AddressSpace;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub timing: TimingConfig,
    pub protocol: ProtocolConfig,
    pub serial: SerialConfig,
    pub target: TargetConfig,
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_ns: u64,
    pub strobe_ns: u64,
    /// `null` waits for BUSACK forever.
    pub ack_timeout_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            settle_ns: 500,
            strobe_ns: 1_000,
            ack_timeout_ms: Some(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Echo accepted hex digits back to the host.
    pub echo_input: bool,
    /// Read timeout on the command link; `null` blocks indefinitely.
    pub input_timeout_ms: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            echo_input: true,
            input_timeout_ms: Some(1_000),
        }
    }
}

impl ProtocolConfig {
    pub fn input_timeout(&self) -> Option<Duration> {
        self.input_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: None,
            baud_rate: 62_500,
            timeout_ms: 2_000,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Behavior of the simulated target system behind the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// BUSACK polls that see "not granted" before the target lets go.
    pub ack_latency_polls: u32,
    /// A target that never grants the bus when false.
    pub responsive: bool,
    /// Initial content of every memory and I/O location.
    pub fill: u8,
    pub preload: Vec<PreloadRegion>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            ack_latency_polls: 2,
            responsive: true,
            fill: 0xFF,
            preload: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadRegion {
    #[serde(default)]
    pub space: AddressSpace,
    pub address: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub chunk_size: usize,
    /// Retries per chunk before giving up; `null` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            chunk_size: 64,
            max_retries: Some(5),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| BridgeError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&content)?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
