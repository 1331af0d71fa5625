// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Exports - the policy boundary for shared filesystem subtrees
//!
//! An export grants a set of [`AccessFlags`] to each caller. Per-client rules
//! are evaluated in order and the first rule whose host list matches the
//! caller's address wins; otherwise the export default applies.

use crate::domain::access::AccessFlags;
use crate::domain::credential::Credential;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

/// Export identifier, embedded in every file handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExportId(pub u16);

impl ExportId {
    /// Reserved for the synthetic pseudo filesystem
    pub const PSEUDO: ExportId = ExportId(0);
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host pattern in a client rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMatch {
    Any,
    Addr(IpAddr),
}

impl HostMatch {
    pub fn matches(&self, addr: Option<IpAddr>) -> bool {
        match self {
            HostMatch::Any => true,
            HostMatch::Addr(expected) => addr == Some(*expected),
        }
    }
}

impl FromStr for HostMatch {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(HostMatch::Any);
        }
        Ok(HostMatch::Addr(s.parse()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRule {
    pub hosts: Vec<HostMatch>,
    pub access: AccessFlags,
}

#[derive(Debug, Clone)]
pub struct Export {
    pub id: ExportId,
    /// Backing path on the server
    pub path: String,
    /// Where the export appears in the pseudo filesystem
    pub pseudo_path: String,
    /// Access granted when no client rule matches
    pub access: AccessFlags,
    pub clients: Vec<ClientRule>,
    /// Objects in this export are served as pNFS data-server objects
    pub data_server: bool,
    pub anonymous_uid: u32,
    pub anonymous_gid: u32,
}

impl Export {
    /// Permission snapshot for one caller
    pub fn permissions_for(&self, credential: &Credential) -> AccessFlags {
        self.clients
            .iter()
            .find(|rule| rule.hosts.iter().any(|h| h.matches(credential.client_addr)))
            .map(|rule| rule.access)
            .unwrap_or(self.access)
    }
}

/// Export/permission table consulted by handlers that bind an export
pub trait ExportTable: Send + Sync {
    fn get(&self, id: ExportId) -> Option<Arc<Export>>;

    fn exports(&self) -> Vec<Arc<Export>>;

    /// The synthetic export backing the pseudo filesystem
    fn pseudo_root_export(&self) -> Option<Arc<Export>> {
        self.get(ExportId::PSEUDO)
    }

    /// Access `credential` is granted on `export`
    fn permissions(&self, export: &Export, credential: &Credential) -> AccessFlags {
        export.permissions_for(credential)
    }
}
