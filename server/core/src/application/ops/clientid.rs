// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! NFSv4.0 client-id operations: SETCLIENTID, SETCLIENTID_CONFIRM, RENEW

use crate::application::compound::context::CompoundContext;
use crate::domain::compound::{OpArgs, OpResult, ResBody};
use crate::domain::opcode::MinorVersion;
use crate::domain::status::Nfsstat4;
use tracing::{debug, info};

pub fn setclientid(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Setclientid { verifier, owner } = args else {
        return Nfsstat4::Badxdr;
    };
    if ctx.minor_version != MinorVersion::V40 {
        return Nfsstat4::Notsupp;
    }

    let client = ctx.state.clients.setclientid(owner.clone(), *verifier);
    debug!(client_id = %client.id, "SETCLIENTID recorded unconfirmed client");
    result.body = ResBody::Setclientid {
        clientid: client.id,
        confirm: client.confirm,
    };
    Nfsstat4::Ok
}

pub fn setclientid_confirm(args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::SetclientidConfirm { clientid, confirm } = args else {
        return Nfsstat4::Badxdr;
    };
    if ctx.minor_version != MinorVersion::V40 {
        return Nfsstat4::Notsupp;
    }

    match ctx.state.clients.confirm(*clientid, confirm) {
        Ok(client) => {
            info!(client_id = %client.id, "Client confirmed");
            Nfsstat4::Ok
        }
        Err(status) => status,
    }
}

pub fn renew(args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Renew { clientid } = args else {
        return Nfsstat4::Badxdr;
    };
    if ctx.minor_version != MinorVersion::V40 {
        return Nfsstat4::Notsupp;
    }

    let Some(client) = ctx.state.clients.get(*clientid) else {
        return Nfsstat4::StaleClientid;
    };
    if !client.is_confirmed() {
        return Nfsstat4::StaleClientid;
    }
    if !client.lease().is_valid(ctx.state.lease_lifetime) {
        return Nfsstat4::Expired;
    }

    ctx.reserve_lease(client);
    Nfsstat4::Ok
}
