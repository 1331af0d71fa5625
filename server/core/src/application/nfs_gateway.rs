// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! NFS Gateway Application Service
//!
//! Owns the lifecycle of the NFSv4 listener: wiring the in-memory state from
//! configuration, starting and stopping the accept loop, and health checks.
//!
//! ## Architecture
//! - One listener for NFSv4, MOUNT v3 and NLM v4 (default port 2049)
//! - Compounds run on the blocking pool, one worker per compound
//! - Always-on service (starts with `nfs4d serve`)
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Lifecycle of the NFS server

use crate::application::compound::CompoundEngine;
use crate::application::legacy::LegacyService;
use crate::application::server_state::ServerState;
use crate::domain::export::ExportTable;
use crate::domain::server_config::{ConfigError, ServerConfig};
use crate::infrastructure::rpc::{RpcDispatcher, RpcServer, TransportError};
use crate::infrastructure::{
    InMemoryClientRegistry, InMemoryMountList, InMemoryNsmRegistry, InMemorySessionRegistry, MemoryStore,
    PseudoFsError, PseudoFsTree, StaticExportTable,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("NFS server already running")]
    AlreadyRunning,

    #[error("NFS server not running")]
    NotRunning,

    #[error("Invalid bind address {address}: {error}")]
    InvalidAddress { address: String, error: String },

    #[error("Failed to bind to {address}: {error}")]
    BindFailed { address: SocketAddr, error: String },

    #[error("Server health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Pseudo filesystem error: {0}")]
    PseudoFs(#[from] PseudoFsError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub struct NfsGatewayService {
    engine: CompoundEngine,
    legacy: LegacyService,
    server: RpcServer,
    is_running: Arc<Mutex<bool>>,
}

impl NfsGatewayService {
    pub fn new(engine: CompoundEngine, legacy: LegacyService, bind_address: SocketAddr) -> Self {
        let server = RpcServer::new(RpcDispatcher::new(engine.clone(), legacy.clone()), bind_address);
        Self {
            engine,
            legacy,
            server,
            is_running: Arc::new(Mutex::new(false)),
        }
    }

    /// Wire a server backed by in-memory state
    pub fn from_config(config: &ServerConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let bind_address: SocketAddr = config.bind_address.parse().map_err(|e: std::net::AddrParseError| {
            GatewayError::InvalidAddress {
                address: config.bind_address.clone(),
                error: e.to_string(),
            }
        })?;

        let exports = Arc::new(StaticExportTable::from_config(config)?);
        let store = Arc::new(MemoryStore::new());
        let pseudo_fs = Arc::new(PseudoFsTree::build(&store, &exports.exports())?);

        let state = Arc::new(ServerState::new(
            exports,
            store,
            pseudo_fs,
            Arc::new(InMemorySessionRegistry::new()),
            Arc::new(InMemoryClientRegistry::new()),
            config,
        ));
        let legacy = LegacyService::new(Arc::new(InMemoryMountList::new()), Arc::new(InMemoryNsmRegistry::new()));

        Ok(Self::new(CompoundEngine::new(state), legacy, bind_address))
    }

    /// Bind the listener and start accepting connections
    pub async fn start_server(&self) -> Result<SocketAddr, GatewayError> {
        if *self.is_running.lock() {
            return Err(GatewayError::AlreadyRunning);
        }

        info!("Starting NFS server gateway on {}", self.server.bind_address());
        let local_addr = self.server.start().await.map_err(|e| match e {
            TransportError::Io(io) => GatewayError::BindFailed {
                address: self.server.bind_address(),
                error: io.to_string(),
            },
            other => GatewayError::Transport(other),
        })?;
        *self.is_running.lock() = true;

        info!("NFS server gateway listening on {}", local_addr);
        Ok(local_addr)
    }

    pub async fn stop_server(&self) -> Result<(), GatewayError> {
        if !*self.is_running.lock() {
            return Err(GatewayError::NotRunning);
        }

        info!("Stopping NFS server gateway");
        self.server.stop().await;
        *self.is_running.lock() = false;
        debug!("NFS server gateway stopped");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), GatewayError> {
        if !*self.is_running.lock() {
            return Err(GatewayError::NotRunning);
        }
        if !self.server.is_running() {
            return Err(GatewayError::HealthCheckFailed("Server task has stopped".to_string()));
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.lock() && self.server.is_running()
    }

    pub fn engine(&self) -> &CompoundEngine {
        &self.engine
    }

    pub fn state(&self) -> &Arc<ServerState> {
        self.engine.state()
    }

    pub fn legacy(&self) -> &LegacyService {
        &self.legacy
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }
}
