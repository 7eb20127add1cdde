//! Service settings
//!
//! Each setting comes from the first source that has it: command line (or
//! its environment variable), then the TOML config file, then the compiled
//! default.

use catsnap_common::config::{CompiledDefaults, TomlConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub public_base_url: Option<String>,
    pub workers: Option<usize>,
    pub log_level: Option<String>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    /// Prefix of blob URLs handed to clients
    pub public_base_url: String,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

/// Blobs are served by this service unless a base URL is configured
pub const DEFAULT_PUBLIC_BASE_URL: &str = "/public";

impl ServiceConfig {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig, defaults: &CompiledDefaults) -> Self {
        Self {
            bind_address: cli
                .bind_address
                .clone()
                .or_else(|| toml.server.bind_address.clone())
                .unwrap_or_else(|| defaults.bind_address.clone()),
            port: cli.port.or(toml.server.port).unwrap_or(defaults.port),
            public_base_url: cli
                .public_base_url
                .clone()
                .or_else(|| toml.server.public_base_url.clone())
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
            worker_count: cli
                .workers
                .or(toml.worker.worker_count)
                .unwrap_or(defaults.worker_count)
                .max(1),
            queue_capacity: toml
                .worker
                .queue_capacity
                .unwrap_or(defaults.queue_capacity)
                .max(1),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| toml.logging.level.clone())
                .unwrap_or_else(|| defaults.log_level.clone()),
            log_file: toml.logging.file.clone().or_else(|| defaults.log_file.clone()),
        }
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", addr, e))
    }
}
