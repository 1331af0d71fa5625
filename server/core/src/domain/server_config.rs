// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Server Configuration Types
//
// Defines the YAML configuration schema for the nfs4d server:
// - Listener and optional Prometheus metrics addresses
// - Client lease lifetime
// - NFSv4.1 fore-channel session limits
// - Export list with per-client access rules

use crate::domain::access::AccessType;
use crate::domain::credential::{ANON_GID, ANON_UID};
use crate::domain::export::{ClientRule, Export, ExportId, HostMatch};
use crate::domain::session::ChannelAttrs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("export_id 0 is reserved for the pseudo filesystem (export path {0})")]
    ReservedExportId(String),

    #[error("duplicate export_id {0}")]
    DuplicateExportId(u16),

    #[error("pseudo_path '{0}' must be absolute")]
    RelativePseudoPath(String),

    #[error("duplicate pseudo_path '{0}'")]
    DuplicatePseudoPath(String),

    #[error("invalid client host '{host}' in export {export_id}")]
    InvalidHost { export_id: u16, host: String },

    #[error("session.{0} must be greater than zero")]
    ZeroSessionLimit(&'static str),

    #[error("lease_lifetime must be greater than zero")]
    ZeroLeaseLifetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP listener address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Client lease period
    #[serde(default = "default_lease_lifetime", with = "humantime_serde")]
    pub lease_lifetime: Duration,

    #[serde(default)]
    pub session: SessionConfig,

    /// Prometheus exporter listener; metrics are not exported when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_address: Option<String>,

    #[serde(default)]
    pub exports: Vec<ExportConfig>,
}

/// Fore-channel limits offered to clients by CREATE_SESSION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_operations")]
    pub max_operations: u32,

    /// Slot table size
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_max_message_size")]
    pub max_request_size: u32,

    #[serde(default = "default_max_message_size")]
    pub max_response_size: u32,

    #[serde(default = "default_max_response_size_cached")]
    pub max_response_size_cached: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub export_id: u16,

    /// Backing path on the server
    pub path: String,

    /// Position in the pseudo filesystem
    pub pseudo_path: String,

    #[serde(default)]
    pub access: AccessType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<ClientAccessConfig>,

    #[serde(default)]
    pub data_server: bool,

    #[serde(default = "default_anonymous_id")]
    pub anonymous_uid: u32,

    #[serde(default = "default_anonymous_gid")]
    pub anonymous_gid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAccessConfig {
    /// IP addresses, or `*`
    pub hosts: Vec<String>,
    pub access: AccessType,
}

fn default_bind_address() -> String {
    "0.0.0.0:2049".to_string()
}

fn default_lease_lifetime() -> Duration {
    Duration::from_secs(60)
}

fn default_max_operations() -> u32 {
    16
}

fn default_max_requests() -> u32 {
    8
}

fn default_max_message_size() -> u32 {
    1024 * 1024
}

fn default_max_response_size_cached() -> u32 {
    64 * 1024
}

fn default_anonymous_id() -> u32 {
    ANON_UID
}

fn default_anonymous_gid() -> u32 {
    ANON_GID
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_requests: default_max_requests(),
            max_request_size: default_max_message_size(),
            max_response_size: default_max_message_size(),
            max_response_size_cached: default_max_response_size_cached(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            lease_lifetime: default_lease_lifetime(),
            session: SessionConfig::default(),
            metrics_address: None,
            exports: vec![],
        }
    }
}

impl SessionConfig {
    /// Server-side fore-channel limits
    pub fn fore_channel(&self) -> ChannelAttrs {
        ChannelAttrs {
            header_pad_size: 0,
            max_request_size: self.max_request_size,
            max_response_size: self.max_response_size,
            max_response_size_cached: self.max_response_size_cached,
            max_operations: self.max_operations,
            max_requests: self.max_requests,
        }
    }
}

impl ExportConfig {
    /// Build the runtime export, parsing client host patterns
    pub fn to_export(&self) -> Result<Export, ConfigError> {
        let clients = self
            .clients
            .iter()
            .map(|client| {
                let hosts = client
                    .hosts
                    .iter()
                    .map(|host| {
                        host.parse::<HostMatch>().map_err(|_| ConfigError::InvalidHost {
                            export_id: self.export_id,
                            host: host.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ClientRule {
                    hosts,
                    access: client.access.flags(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Export {
            id: ExportId(self.export_id),
            path: self.path.clone(),
            pseudo_path: self.pseudo_path.clone(),
            access: self.access.flags(),
            clients,
            data_server: self.data_server,
            anonymous_uid: self.anonymous_uid,
            anonymous_gid: self.anonymous_gid,
        })
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. NFS4D_CONFIG_PATH environment variable
    /// 2. ./nfs4d.yaml (working directory)
    /// 3. ~/.nfs4d/config.yaml (user home)
    /// 4. /etc/nfs4d/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("NFS4D_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./nfs4d.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".nfs4d").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/nfs4d/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NFS4D_BIND_ADDRESS") {
            tracing::info!("Environment override: NFS4D_BIND_ADDRESS={}", val);
            self.bind_address = val;
        }

        if let Ok(val) = std::env::var("NFS4D_LEASE_LIFETIME") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(lifetime) => {
                    tracing::info!("Environment override: NFS4D_LEASE_LIFETIME={}", val);
                    self.lease_lifetime = lifetime;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for NFS4D_LEASE_LIFETIME: '{}' ({}). Ignoring.",
                        val,
                        e
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_lifetime.is_zero() {
            return Err(ConfigError::ZeroLeaseLifetime);
        }
        if self.session.max_operations == 0 {
            return Err(ConfigError::ZeroSessionLimit("max_operations"));
        }
        if self.session.max_requests == 0 {
            return Err(ConfigError::ZeroSessionLimit("max_requests"));
        }

        let mut ids = HashSet::new();
        let mut pseudo_paths = HashSet::new();
        for export in &self.exports {
            if export.export_id == ExportId::PSEUDO.0 {
                return Err(ConfigError::ReservedExportId(export.path.clone()));
            }
            if !ids.insert(export.export_id) {
                return Err(ConfigError::DuplicateExportId(export.export_id));
            }
            if !export.pseudo_path.starts_with('/') {
                return Err(ConfigError::RelativePseudoPath(export.pseudo_path.clone()));
            }
            let normalized = export.pseudo_path.trim_end_matches('/');
            if !pseudo_paths.insert(normalized.to_string()) {
                return Err(ConfigError::DuplicatePseudoPath(export.pseudo_path.clone()));
            }
            export.to_export()?;
        }

        Ok(())
    }
}
