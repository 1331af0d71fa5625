// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! The compound engine and its operation handlers, the legacy single-call
//! protocols and the gateway service that runs them.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Request processing on top of the domain collaborators

pub mod compound;
pub mod legacy;
pub mod nfs_gateway;
pub mod ops;
pub mod server_state;

pub use compound::{CompoundEngine, CompoundError};
pub use legacy::LegacyService;
pub use nfs_gateway::{GatewayError, NfsGatewayService};
pub use server_state::ServerState;
