//! # Runtime Container
//!
//! Configuration for the relay process.

pub mod config;

pub use config::{
    BroadcastConfig, ConfigError, IngestConfig, LoggingConfig, RequestConfig, RuntimeConfig,
};
