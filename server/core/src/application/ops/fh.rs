// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Current / saved file-handle operations

use super::status_of;
use crate::application::compound::context::CompoundContext;
use crate::domain::compound::{OpArgs, OpResult, ResBody};
use crate::domain::status::Nfsstat4;

pub fn putfh(args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Putfh { object } = args else {
        return Nfsstat4::Badxdr;
    };
    status_of(ctx.set_current_handle(object.clone()))
}

pub fn putrootfh(_args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let root = ctx.root_fh.clone();
    status_of(ctx.set_current_handle(root))
}

/// The public handle is the pseudo filesystem root
pub fn putpubfh(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    putrootfh(args, ctx, result)
}

pub fn getfh(_args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let status = ctx.current.fh.check();
    if !status.is_ok() {
        return status;
    }
    result.body = ResBody::Getfh {
        object: ctx.current.fh.clone(),
    };
    Nfsstat4::Ok
}

pub fn savefh(_args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let status = ctx.current.fh.check();
    if !status.is_ok() {
        return status;
    }
    ctx.save();
    Nfsstat4::Ok
}

pub fn restorefh(_args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    status_of(ctx.restore())
}
