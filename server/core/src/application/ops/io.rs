// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! READ, WRITE and COMMIT
//!
//! These run against either a metadata-cache object or, for exports served as
//! pNFS data servers, the data-server object bound by PUTFH.

use crate::application::compound::context::CompoundContext;
use crate::domain::compound::{OpArgs, OpResult, ResBody, StableHow};
use crate::domain::object::{ObjectKind, ObjectRef};
use crate::domain::status::Nfsstat4;

pub fn read(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Read { offset, count } = args else {
        return Nfsstat4::Badxdr;
    };
    let count = (*count).min(ctx.state.fore_channel.max_response_size);

    let outcome = match &ctx.current.object {
        ObjectRef::DataServer(ds) => ds.read(*offset, count),
        ObjectRef::Cache(entry) => entry.read(*offset, count),
        ObjectRef::None => Err(Nfsstat4::Nofilehandle),
    };

    match outcome {
        Ok((data, eof)) => {
            result.body = ResBody::Read { eof, data };
            Nfsstat4::Ok
        }
        Err(status) => status,
    }
}

pub fn write(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Write { offset, data, .. } = args else {
        return Nfsstat4::Badxdr;
    };

    let outcome = match &ctx.current.object {
        ObjectRef::DataServer(ds) => ds.write(*offset, data),
        ObjectRef::Cache(entry) => entry.write(*offset, data),
        ObjectRef::None => Err(Nfsstat4::Nofilehandle),
    };

    match outcome {
        Ok(count) => {
            // Storage is in memory, so every write is as stable as it gets
            result.body = ResBody::Write {
                count,
                committed: StableHow::FileSync,
                verifier: ctx.state.write_verifier,
            };
            Nfsstat4::Ok
        }
        Err(status) => status,
    }
}

pub fn commit(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Commit { .. } = args else {
        return Nfsstat4::Badxdr;
    };
    let entry = match ctx.current_entry() {
        Ok(entry) => entry,
        Err(status) => return status,
    };

    match entry.kind() {
        ObjectKind::Regular => {
            result.body = ResBody::Commit {
                verifier: ctx.state.write_verifier,
            };
            Nfsstat4::Ok
        }
        ObjectKind::Directory => Nfsstat4::Isdir,
        ObjectKind::Symlink => Nfsstat4::Inval,
    }
}
