// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Export access flags
//!
//! Each operation descriptor names the access it needs; each export grants a
//! set of these flags to a caller. The engine refuses an operation unless every
//! required flag is granted.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Access granted by an export, or required by an operation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const READ_DATA = 0x0000_0001;
        const WRITE_DATA = 0x0000_0002;
        const READ_METADATA = 0x0000_0004;
        const WRITE_METADATA = 0x0000_0008;
    }
}

impl AccessFlags {
    /// Flags whose absence turns a refusal into `NFS4ERR_ROFS`
    pub const MODIFY: AccessFlags = AccessFlags::WRITE_DATA.union(AccessFlags::WRITE_METADATA);

    /// Whether the requirement contains a modify-type flag
    pub fn wants_modify(self) -> bool {
        self.intersects(Self::MODIFY)
    }
}

/// Export access type as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    None,
    Ro,
    #[default]
    Rw,
    Mdonly,
    MdonlyRo,
}

impl AccessType {
    pub fn flags(self) -> AccessFlags {
        match self {
            AccessType::None => AccessFlags::empty(),
            AccessType::Ro => AccessFlags::READ_DATA | AccessFlags::READ_METADATA,
            AccessType::Rw => AccessFlags::all(),
            AccessType::Mdonly => AccessFlags::READ_METADATA | AccessFlags::WRITE_METADATA,
            AccessType::MdonlyRo => AccessFlags::READ_METADATA,
        }
    }
}

/// ACCESS4 request bits carried by the ACCESS operation
pub mod access4 {
    pub const READ: u32 = 0x0000_0001;
    pub const LOOKUP: u32 = 0x0000_0002;
    pub const MODIFY: u32 = 0x0000_0004;
    pub const EXTEND: u32 = 0x0000_0008;
    pub const DELETE: u32 = 0x0000_0010;
    pub const EXECUTE: u32 = 0x0000_0020;
    pub const ALL: u32 = READ | LOOKUP | MODIFY | EXTEND | DELETE | EXECUTE;
}
