// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operation table
//!
//! One descriptor per op code, in op-code order, followed by the ILLEGAL
//! sentinel. Each minor version maps its own legal range onto the table;
//! everything outside that range resolves to the sentinel.

use crate::application::compound::context::CompoundContext;
use crate::application::ops;
use crate::domain::access::AccessFlags;
use crate::domain::compound::{OpArgs, OpResult};
use crate::domain::opcode::{MinorVersion, OpCode};
use crate::domain::status::Nfsstat4;
use tracing::warn;

/// Uniform handler capability. The handler fills `result` and returns the
/// status the engine records in the result envelope.
pub type OpHandler = fn(&OpArgs, &mut CompoundContext<'_>, &mut OpResult) -> Nfsstat4;

pub struct OpDescriptor {
    pub name: &'static str,
    pub op: OpCode,
    /// Access the export must grant before the handler runs
    pub required: AccessFlags,
    pub handler: OpHandler,
}

impl std::fmt::Debug for OpDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpDescriptor")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish()
    }
}

const NONE: AccessFlags = AccessFlags::empty();
const MD_READ: AccessFlags = AccessFlags::READ_METADATA;
const MD_WRITE: AccessFlags = AccessFlags::WRITE_METADATA;
const READ: AccessFlags = AccessFlags::READ_DATA;
const WRITE: AccessFlags = AccessFlags::WRITE_DATA;

macro_rules! optab {
    ($($op:ident, $required:expr, $handler:path;)+) => {
        static OPTAB: &[OpDescriptor] = &[
            $(OpDescriptor {
                name: OpCode::$op.name(),
                op: OpCode::$op,
                required: $required,
                handler: $handler,
            },)+
        ];
    };
}

optab! {
    Access, MD_READ, ops::attr::access;
    Close, MD_READ, ops::notsupp;
    Commit, MD_WRITE, ops::io::commit;
    Create, MD_WRITE, ops::dir::create;
    Delegpurge, NONE, ops::notsupp;
    Delegreturn, MD_READ, ops::notsupp;
    Getattr, MD_READ, ops::attr::getattr;
    Getfh, NONE, ops::fh::getfh;
    Link, MD_WRITE, ops::notsupp;
    Lock, MD_READ, ops::notsupp;
    Lockt, MD_READ, ops::notsupp;
    Locku, MD_READ, ops::notsupp;
    Lookup, MD_READ, ops::dir::lookup;
    Lookupp, MD_READ, ops::dir::lookupp;
    Nverify, MD_READ, ops::notsupp;
    Open, MD_READ, ops::notsupp;
    Openattr, MD_READ, ops::notsupp;
    OpenConfirm, NONE, ops::notsupp;
    OpenDowngrade, MD_READ, ops::notsupp;
    Putfh, NONE, ops::fh::putfh;
    Putpubfh, NONE, ops::fh::putpubfh;
    Putrootfh, NONE, ops::fh::putrootfh;
    Read, READ, ops::io::read;
    Readdir, MD_READ, ops::notsupp;
    Readlink, MD_READ, ops::dir::readlink;
    Remove, MD_WRITE, ops::notsupp;
    Rename, MD_WRITE, ops::notsupp;
    Renew, NONE, ops::clientid::renew;
    Restorefh, NONE, ops::fh::restorefh;
    Savefh, NONE, ops::fh::savefh;
    Secinfo, MD_READ, ops::notsupp;
    Setattr, MD_WRITE, ops::notsupp;
    Setclientid, NONE, ops::clientid::setclientid;
    SetclientidConfirm, NONE, ops::clientid::setclientid_confirm;
    Verify, MD_READ, ops::notsupp;
    Write, WRITE, ops::io::write;
    ReleaseLockowner, NONE, ops::notsupp;
    BackchannelCtl, NONE, ops::illegal;
    BindConnToSession, NONE, ops::illegal;
    ExchangeId, NONE, ops::session::exchange_id;
    CreateSession, NONE, ops::session::create_session;
    DestroySession, NONE, ops::session::destroy_session;
    FreeStateid, NONE, ops::notsupp;
    GetDirDelegation, NONE, ops::illegal;
    Getdeviceinfo, NONE, ops::notsupp;
    Getdevicelist, MD_READ, ops::notsupp;
    Layoutcommit, NONE, ops::notsupp;
    Layoutget, MD_READ, ops::notsupp;
    Layoutreturn, NONE, ops::notsupp;
    SecinfoNoName, MD_READ, ops::illegal;
    Sequence, NONE, ops::session::sequence;
    SetSsv, NONE, ops::notsupp;
    TestStateid, NONE, ops::notsupp;
    WantDelegation, MD_READ, ops::illegal;
    DestroyClientid, NONE, ops::illegal;
    ReclaimComplete, NONE, ops::session::reclaim_complete;
    Illegal, NONE, ops::illegal;
}

/// Descriptor for a known op code
pub fn descriptor(op: OpCode) -> &'static OpDescriptor {
    let index = match op {
        OpCode::Illegal => OPTAB.len() - 1,
        op => (op as u32 - OpCode::FIRST) as usize,
    };
    &OPTAB[index]
}

/// Map a raw op code onto the dialect's legal range
pub fn dialect_op(minor: MinorVersion, raw: u32) -> OpCode {
    if !minor.is_legal(raw) {
        return OpCode::Illegal;
    }
    OpCode::from_u32(raw).unwrap_or(OpCode::Illegal)
}

/// Resolve a raw op code for `minor`. Never fails: out-of-range codes get the
/// ILLEGAL descriptor, whose handler reports `NFS4ERR_OP_ILLEGAL`.
pub fn resolve(minor: MinorVersion, raw: u32) -> &'static OpDescriptor {
    let op = dialect_op(minor, raw);
    if op == OpCode::Illegal {
        warn!("Client is using Illegal operation #{}", raw);
    }
    descriptor(op)
}
