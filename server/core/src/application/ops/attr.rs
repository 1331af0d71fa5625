// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! GETATTR and ACCESS

use crate::application::compound::context::CompoundContext;
use crate::domain::access::{access4, AccessFlags};
use crate::domain::compound::{OpArgs, OpResult, ResBody};
use crate::domain::credential::Credential;
use crate::domain::object::ObjectAttrs;
use crate::domain::status::Nfsstat4;

pub fn getattr(_args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    match ctx.current_entry() {
        Ok(entry) => {
            result.body = ResBody::Getattr { attrs: entry.attrs() };
            Nfsstat4::Ok
        }
        Err(status) => status,
    }
}

pub fn access(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Access { access } = args else {
        return Nfsstat4::Badxdr;
    };
    let entry = match ctx.current_entry() {
        Ok(entry) => entry,
        Err(status) => return status,
    };

    let supported = access & access4::ALL;
    let granted = granted_access(&entry.attrs(), &ctx.credential, ctx.permissions()) & supported;

    result.body = ResBody::Access {
        supported,
        access: granted,
    };
    Nfsstat4::Ok
}

/// ACCESS4 bits `credential` holds on an object, bounded by the export
fn granted_access(attrs: &ObjectAttrs, credential: &Credential, export: AccessFlags) -> u32 {
    let by_mode = if credential.is_root() {
        access4::ALL
    } else {
        let shift = if credential.uid == attrs.uid {
            6
        } else if credential.gid == attrs.gid || credential.gids.contains(&attrs.gid) {
            3
        } else {
            0
        };
        let bits = (attrs.mode >> shift) & 0o7;

        let mut granted = 0;
        if bits & 0o4 != 0 {
            granted |= access4::READ;
        }
        if bits & 0o2 != 0 {
            granted |= access4::MODIFY | access4::EXTEND | access4::DELETE;
        }
        if bits & 0o1 != 0 {
            granted |= access4::LOOKUP | access4::EXECUTE;
        }
        granted
    };

    let mut allowed = 0;
    if export.intersects(AccessFlags::READ_DATA | AccessFlags::READ_METADATA) {
        allowed |= access4::READ | access4::LOOKUP | access4::EXECUTE;
    }
    if export.wants_modify() {
        allowed |= access4::MODIFY | access4::EXTEND | access4::DELETE;
    }
    by_mode & allowed
}
