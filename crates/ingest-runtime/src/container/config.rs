//! # Relay Configuration
//!
//! Unified configuration for the ingest loop, request/reply and logging.
//! Every field has a default; environment variables override them.
//!
//! | Variable                | Field                              |
//! |-------------------------|------------------------------------|
//! | `TR_BIND_ADDR`          | `ingest.bind_addr`                 |
//! | `TR_MAX_DATAGRAM`       | `ingest.max_datagram_size`         |
//! | `TR_REQUEST_TIMEOUT_MS` | `request.timeout_ms`               |
//! | `TR_LOG_LEVEL`          | `logging.level` (`RUST_LOG` wins)  |
//! | `TR_JSON_LOGS`          | `logging.json`                     |
//! | `TR_RELAY_APIDS`        | `broadcast.application_ids`        |

use packet_codec::header::MAX_APPLICATION_ID;
use packet_codec::{HEADER_LEN, MAX_DATA_FIELD_LEN, MIN_PACKET_LEN};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Packet source configuration.
    pub ingest: IngestConfig,
    /// Request/reply configuration.
    pub request: RequestConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Broadcast relay configuration.
    pub broadcast: BroadcastConfig,
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid value for {variable}: {value:?} ({reason})")]
    InvalidValue {
        variable: &'static str,
        value: String,
        reason: String,
    },

    /// Datagram buffer cannot hold the smallest valid packet.
    #[error("max datagram size {size} is below the minimum packet length {min}")]
    DatagramTooSmall { size: usize, min: usize },

    /// Request deadline of zero.
    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    /// An application identifier does not fit in 11 bits.
    #[error("application id {0} does not fit in 11 bits")]
    ApplicationIdOutOfRange(u32),
}

/// Packet source configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// UDP listen address.
    pub bind_addr: SocketAddr,
    /// Receive buffer size. Longer datagrams are truncated.
    pub max_datagram_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 10_015)),
            max_datagram_size: HEADER_LEN + MAX_DATA_FIELD_LEN,
        }
    }
}

/// Request/reply configuration.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Default deadline for correlated requests.
    pub timeout_ms: u64,
}

impl RequestConfig {
    /// The deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: shared_bus::DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Broadcast relay configuration.
#[derive(Debug, Clone, Default)]
pub struct BroadcastConfig {
    /// Application identifiers whose telemetry channels are relayed.
    pub application_ids: Vec<u16>,
}

impl RuntimeConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden from `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("TR_BIND_ADDR") {
            config.ingest.bind_addr = parse_value("TR_BIND_ADDR", &value)?;
        }
        if let Some(value) = lookup("TR_MAX_DATAGRAM") {
            config.ingest.max_datagram_size = parse_value("TR_MAX_DATAGRAM", &value)?;
        }
        if let Some(value) = lookup("TR_REQUEST_TIMEOUT_MS") {
            config.request.timeout_ms = parse_value("TR_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("RUST_LOG").or_else(|| lookup("TR_LOG_LEVEL")) {
            config.logging.level = value;
        }
        if let Some(value) = lookup("TR_JSON_LOGS") {
            config.logging.json = parse_flag("TR_JSON_LOGS", &value)?;
        }
        if let Some(value) = lookup("TR_RELAY_APIDS") {
            config.broadcast.application_ids = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_value::<u32>("TR_RELAY_APIDS", s))
                .map(|apid| {
                    let apid = apid?;
                    u16::try_from(apid)
                        .ok()
                        .filter(|id| *id <= MAX_APPLICATION_ID)
                        .ok_or(ConfigError::ApplicationIdOutOfRange(apid))
                })
                .collect::<Result<_, _>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.max_datagram_size < MIN_PACKET_LEN {
            return Err(ConfigError::DatagramTooSmall {
                size: self.ingest.max_datagram_size,
                min: MIN_PACKET_LEN,
            });
        }
        if self.request.timeout_ms == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        if let Some(apid) = self
            .broadcast
            .application_ids
            .iter()
            .find(|id| **id > MAX_APPLICATION_ID)
        {
            return Err(ConfigError::ApplicationIdOutOfRange(u32::from(*apid)));
        }
        Ok(())
    }
}

fn parse_value<T>(variable: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        variable,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            variable,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
