// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use uuid::Uuid;

/// Per-agent gRPC gateway bridging local components onto an MQTT bus and a
/// per-agent Raft consensus layer.
#[derive(Debug, Parser, Clone)]
#[command(name = "tnc-gateway", version, about)]
pub struct Config {
    /// gRPC port to listen on.
    #[arg(long, env = "TNC_GRPC_PORT", default_value = "50060")]
    pub grpc_port: u16,

    /// MQTT broker URL (e.g. mqtt://host:1883, mqtts://host:8883, ws://host/mqtt).
    /// Bus autostart is suppressed until this is set.
    #[arg(long, env = "TNC_BUS_URL")]
    pub bus_url: Option<String>,

    /// Isolation namespace on the bus.
    #[arg(long, env = "TNC_NAMESPACE", default_value = "tnc")]
    pub namespace: String,

    /// Human-readable agent identity name.
    #[arg(long, env = "TNC_AGENT_NAME", default_value = "FlowPro Agent")]
    pub agent_name: String,

    /// Stable agent identity id. Defaults to a random uuid generated once
    /// per process start.
    #[arg(long, env = "TNC_AGENT_ID")]
    pub agent_id: Option<Uuid>,

    /// Basic auth username for the bus connection.
    #[arg(long, env = "TNC_BUS_USERNAME")]
    pub bus_username: Option<String>,

    /// Basic auth password for the bus connection.
    #[arg(long, env = "TNC_BUS_PASSWORD")]
    pub bus_password: Option<String>,

    /// TLS client certificate (PEM string or file path).
    #[arg(long, env = "TNC_TLS_CERT")]
    pub tls_cert: Option<String>,

    /// TLS client key (PEM string or file path).
    #[arg(long, env = "TNC_TLS_KEY")]
    pub tls_key: Option<String>,

    /// Verify the bus broker's TLS server certificate.
    #[arg(long, env = "TNC_TLS_VERIFY", default_value = "true")]
    pub tls_verify: bool,

    /// Whether publish/observe operations immediately fail when the bus is
    /// offline, rather than queuing until reconnect.
    #[arg(long, env = "TNC_FAIL_FAST_IF_OFFLINE", default_value = "true")]
    pub fail_fast_if_offline: bool,

    /// Folder holding each Raft node's persisted database file.
    #[arg(long, env = "TNC_CONSENSUS_DB_FOLDER")]
    pub consensus_db_folder: Option<std::path::PathBuf>,

    /// Health-check-only HTTP port.
    #[arg(long, env = "TNC_HEALTH_PORT")]
    pub health_port: Option<u16>,

    /// Log format (json or text).
    #[arg(long, env = "TNC_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TNC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Print the version and exit.
    #[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
    pub version: bool,

    /// Write the four .proto assets to the current directory and exit.
    #[arg(short = 'a', long, action = clap::ArgAction::SetTrue)]
    pub assets: bool,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version || self.assets {
            return Ok(());
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("invalid log level: {other}"),
        }
        if self.grpc_port == 0 {
            anyhow::bail!("--grpc-port must be nonzero");
        }
        Ok(())
    }

    /// Resolve the effective agent id, generating a fresh random uuid once
    /// per process start if unset.
    pub fn effective_agent_id(&self) -> Uuid {
        self.agent_id.unwrap_or_else(Uuid::new_v4)
    }

    /// Resolve the folder backing Raft node persistence, defaulting to the
    /// process's current working directory.
    pub fn effective_consensus_db_folder(&self) -> std::path::PathBuf {
        self.consensus_db_folder
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
    }

    /// Whether the bus should be started at all (suppressed until a URL is set).
    pub fn bus_autostart(&self) -> bool {
        self.bus_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
