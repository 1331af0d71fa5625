// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Operation Handlers
//!
//! One function per supported operation, all with the [`OpHandler`]
//! signature. A handler writes its payload into the result it is given and
//! returns the status; the engine copies that status into the result envelope.
//!
//! [`OpHandler`]: crate::application::compound::optab::OpHandler

pub mod attr;
pub mod clientid;
pub mod dir;
pub mod fh;
pub mod io;
pub mod session;

use crate::application::compound::context::CompoundContext;
use crate::domain::compound::{OpArgs, OpResult};
use crate::domain::opcode::OpCode;
use crate::domain::status::Nfsstat4;

/// Longest component name accepted in LOOKUP and CREATE
pub const NAME_MAX: usize = 255;

/// Collapse a handler body written with `?` into its status
pub(crate) fn status_of(result: Result<(), Nfsstat4>) -> Nfsstat4 {
    match result {
        Ok(()) => Nfsstat4::Ok,
        Err(status) => status,
    }
}

/// Validate a single path component
pub(crate) fn check_name(name: &str) -> Result<(), Nfsstat4> {
    if name.is_empty() {
        return Err(Nfsstat4::Inval);
    }
    if name.len() > NAME_MAX {
        return Err(Nfsstat4::Nametoolong);
    }
    if name == "." || name == ".." {
        return Err(Nfsstat4::Badname);
    }
    if name.contains(['/', '\0']) {
        return Err(Nfsstat4::Badchar);
    }
    Ok(())
}

/// Operations known to the table but not implemented by this server
pub fn notsupp(_args: &OpArgs, _ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    Nfsstat4::Notsupp
}

/// OP_ILLEGAL, and every op code outside the dialect's range
pub fn illegal(_args: &OpArgs, _ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    result.op = OpCode::Illegal;
    Nfsstat4::OpIllegal
}
