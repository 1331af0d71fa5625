// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Protocol value types, shared aggregates and the collaborator traits the
//! compound engine consumes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and interfaces with no transport or storage dependency

pub mod access;
pub mod client;
pub mod compound;
pub mod credential;
pub mod export;
pub mod file_handle;
pub mod legacy;
pub mod object;
pub mod opcode;
pub mod pseudo_fs;
pub mod server_config;
pub mod session;
pub mod status;
