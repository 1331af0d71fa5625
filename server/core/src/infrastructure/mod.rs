// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Implementations of the domain collaborator traits, plus the TCP transport.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** In-memory state and ONC-RPC transport
//!
//! # Available Implementations
//!
//! - **StaticExportTable** - export table loaded from configuration
//! - **MemoryStore** - process-lifetime object store
//! - **PseudoFsTree** - pseudo filesystem laid out over the export list
//! - **InMemorySessionRegistry** / **InMemoryClientRegistry** - NFSv4 state
//! - **InMemoryMountList** / **InMemoryNsmRegistry** - MOUNT and NLM side state

pub mod export_table;
pub mod legacy;
pub mod memory_store;
pub mod pseudo_fs;
pub mod registries;
pub mod rpc;

pub use export_table::StaticExportTable;
pub use legacy::{InMemoryMountList, InMemoryNsmClient, InMemoryNsmRegistry};
pub use memory_store::MemoryStore;
pub use pseudo_fs::{PseudoFsError, PseudoFsTree};
pub use registries::{InMemoryClientRegistry, InMemorySessionRegistry};
