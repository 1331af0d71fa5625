// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Server State
//!
//! The collaborators shared by every compound: export table, object store,
//! pseudo filesystem, session and client registries, plus the server's
//! fixed identity (write verifier, owner and scope).
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wiring of collaborator traits for the compound engine

use crate::domain::client::{ClientRegistry, Verifier};
use crate::domain::export::ExportTable;
use crate::domain::object::ObjectStore;
use crate::domain::pseudo_fs::PseudoFs;
use crate::domain::server_config::ServerConfig;
use crate::domain::session::{ChannelAttrs, SessionRegistry};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct ServerState {
    pub exports: Arc<dyn ExportTable>,
    pub objects: Arc<dyn ObjectStore>,
    pub pseudo_fs: Arc<dyn PseudoFs>,
    pub sessions: Arc<dyn SessionRegistry>,
    pub clients: Arc<dyn ClientRegistry>,
    pub lease_lifetime: Duration,
    /// Fore-channel limits offered by CREATE_SESSION
    pub fore_channel: ChannelAttrs,
    /// Changes on every restart so clients can detect lost unstable writes
    pub write_verifier: Verifier,
    pub server_owner: Bytes,
    pub server_scope: Bytes,
}

impl ServerState {
    pub fn new(
        exports: Arc<dyn ExportTable>,
        objects: Arc<dyn ObjectStore>,
        pseudo_fs: Arc<dyn PseudoFs>,
        sessions: Arc<dyn SessionRegistry>,
        clients: Arc<dyn ClientRegistry>,
        config: &ServerConfig,
    ) -> Self {
        let boot = Uuid::new_v4();
        let mut write_verifier = [0u8; 8];
        write_verifier.copy_from_slice(&boot.as_bytes()[..8]);

        Self {
            exports,
            objects,
            pseudo_fs,
            sessions,
            clients,
            lease_lifetime: config.lease_lifetime,
            fore_channel: config.session.fore_channel(),
            write_verifier,
            server_owner: Bytes::from(format!("nfs4d-{}", boot)),
            server_scope: Bytes::from_static(b"nfs4d"),
        }
    }
}
