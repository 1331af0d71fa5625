// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Namespace operations: LOOKUP, LOOKUPP, CREATE, READLINK
//!
//! LOOKUP through a pseudo-filesystem junction lands on the mounted export's
//! root; LOOKUPP from an export root climbs back into the pseudo tree.

use super::{check_name, status_of};
use crate::application::compound::context::CompoundContext;
use crate::domain::compound::{ChangeInfo, CreateKind, OpArgs, OpResult, ResBody};
use crate::domain::credential::AuthFlavor;
use crate::domain::export::ExportId;
use crate::domain::object::{CacheEntry, ObjectKind};
use crate::domain::status::Nfsstat4;
use bytes::Bytes;
use std::sync::Arc;

fn current_dir(ctx: &CompoundContext<'_>) -> Result<Arc<CacheEntry>, Nfsstat4> {
    let dir = ctx.current_entry()?;
    match dir.kind() {
        ObjectKind::Directory => Ok(dir),
        ObjectKind::Symlink => Err(Nfsstat4::Symlink),
        ObjectKind::Regular => Err(Nfsstat4::Notdir),
    }
}

pub fn lookup(args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Lookup { name } = args else {
        return Nfsstat4::Badxdr;
    };
    status_of(do_lookup(name, ctx))
}

fn do_lookup(name: &str, ctx: &mut CompoundContext<'_>) -> Result<(), Nfsstat4> {
    check_name(name)?;
    let dir = current_dir(ctx)?;
    let objects = ctx.state.objects.clone();
    let child = objects.lookup(&dir, name)?;

    match child.junction() {
        Some(export) => {
            let root = objects.root(export)?;
            ctx.set_current_entry(root)
        }
        None => ctx.set_current_entry(child),
    }
}

pub fn lookupp(_args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    status_of(do_lookupp(ctx))
}

fn do_lookupp(ctx: &mut CompoundContext<'_>) -> Result<(), Nfsstat4> {
    let dir = current_dir(ctx)?;
    let objects = ctx.state.objects.clone();

    if dir.parent.is_some() {
        let parent = objects.parent(&dir)?;
        return ctx.set_current_entry(parent);
    }

    // Root of the pseudo filesystem has no parent
    if dir.export_id == ExportId::PSEUDO {
        return Err(Nfsstat4::Noent);
    }

    let junction = ctx
        .state
        .pseudo_fs
        .junction_for(dir.export_id)
        .ok_or(Nfsstat4::Noent)?;
    let junction = objects.get(ExportId::PSEUDO, junction)?;
    let parent = objects.parent(&junction)?;
    ctx.set_current_entry(parent)
}

pub fn create(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Create { kind, name } = args else {
        return Nfsstat4::Badxdr;
    };
    match do_create(kind, name, ctx) {
        Ok(cinfo) => {
            result.body = ResBody::Create { cinfo };
            Nfsstat4::Ok
        }
        Err(status) => status,
    }
}

fn do_create(kind: &CreateKind, name: &str, ctx: &mut CompoundContext<'_>) -> Result<ChangeInfo, Nfsstat4> {
    check_name(name)?;
    let dir = current_dir(ctx)?;

    // Non-AUTH_SYS callers create as the export's anonymous user
    let owner = match (ctx.credential.flavor, &ctx.current.export) {
        (AuthFlavor::Sys, _) | (_, None) => (ctx.credential.uid, ctx.credential.gid),
        (_, Some(export)) => (export.anonymous_uid, export.anonymous_gid),
    };

    let before = dir.attrs().change;
    let entry = ctx.state.objects.create(&dir, name, kind, owner)?;
    let after = dir.attrs().change;

    ctx.set_current_entry(entry)?;
    Ok(ChangeInfo {
        atomic: true,
        before,
        after,
    })
}

pub fn readlink(_args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let entry = match ctx.current_entry() {
        Ok(entry) => entry,
        Err(status) => return status,
    };
    match entry.readlink() {
        Ok(target) => {
            result.body = ResBody::Readlink {
                link: Bytes::from(target),
            };
            Nfsstat4::Ok
        }
        Err(status) => status,
    }
}
