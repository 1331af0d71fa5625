// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! COMPOUND request and response structures
//!
//! Every per-op result is an [`OpResult`] envelope: the op code it answers, a
//! named status field and an op-specific [`ResBody`]. Result payloads that own
//! buffers hold them as [`Bytes`]; a plain `clone()` shares those buffers while
//! [`CompoundResponse::deep_copy`] gives the copy its own allocations, which is
//! what the replay cache stores.

use crate::domain::client::{ClientId, Verifier};
use crate::domain::file_handle::FileHandle;
use crate::domain::object::ObjectAttrs;
use crate::domain::opcode::OpCode;
use crate::domain::session::{ChannelAttrs, SessionId};
use crate::domain::status::Nfsstat4;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Ceiling on the number of operations in one compound
pub const NFS4_MAX_OPERATIONS: usize = 30;

/// Object types creatable with CREATE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateKind {
    Directory,
    Symlink { target: String },
}

/// `stable_how4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StableHow {
    #[default]
    Unstable,
    DataSync,
    FileSync,
}

/// `change_info4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub atomic: bool,
    pub before: u64,
    pub after: u64,
}

/// Decoded operation arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpArgs {
    /// Operations that take no arguments
    Void,
    Access {
        access: u32,
    },
    Commit {
        offset: u64,
        count: u32,
    },
    Create {
        kind: CreateKind,
        name: String,
    },
    Lookup {
        name: String,
    },
    Putfh {
        object: FileHandle,
    },
    Read {
        offset: u64,
        count: u32,
    },
    Write {
        offset: u64,
        stable: StableHow,
        data: Bytes,
    },
    Renew {
        clientid: ClientId,
    },
    Setclientid {
        verifier: Verifier,
        owner: Bytes,
    },
    SetclientidConfirm {
        clientid: ClientId,
        confirm: Verifier,
    },
    ExchangeId {
        verifier: Verifier,
        owner: Bytes,
        flags: u32,
    },
    CreateSession {
        clientid: ClientId,
        sequence: u32,
        flags: u32,
        fore_attrs: ChannelAttrs,
    },
    DestroySession {
        session_id: SessionId,
    },
    Sequence {
        session_id: SessionId,
        sequence_id: u32,
        slot_id: u32,
        highest_slot_id: u32,
        cache_this: bool,
    },
    ReclaimComplete {
        one_fs: bool,
    },
    /// Arguments of an operation this server does not decode
    Opaque(Bytes),
}

/// One entry of the request's operation array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgOp {
    /// Raw op code as received; may be outside every legal range
    pub opcode: u32,
    pub args: OpArgs,
}

impl ArgOp {
    pub fn new(opcode: OpCode, args: OpArgs) -> Self {
        Self {
            opcode: opcode as u32,
            args,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundRequest {
    pub minor_version: u32,
    pub tag: Bytes,
    pub ops: Vec<ArgOp>,
}

/// Op-specific result payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResBody {
    /// Status-only results, and every failed result
    #[default]
    None,
    Access {
        supported: u32,
        access: u32,
    },
    Commit {
        verifier: Verifier,
    },
    Create {
        cinfo: ChangeInfo,
    },
    Getattr {
        attrs: ObjectAttrs,
    },
    Getfh {
        object: FileHandle,
    },
    Read {
        eof: bool,
        data: Bytes,
    },
    Readlink {
        link: Bytes,
    },
    Write {
        count: u32,
        committed: StableHow,
        verifier: Verifier,
    },
    Setclientid {
        clientid: ClientId,
        confirm: Verifier,
    },
    ExchangeId {
        clientid: ClientId,
        sequence_id: u32,
        flags: u32,
        server_owner: Bytes,
        server_scope: Bytes,
    },
    CreateSession {
        session_id: SessionId,
        sequence: u32,
        flags: u32,
        fore_attrs: ChannelAttrs,
    },
    Sequence {
        session_id: SessionId,
        sequence_id: u32,
        slot_id: u32,
        highest_slot_id: u32,
        target_highest_slot_id: u32,
        status_flags: u32,
    },
}

impl ResBody {
    /// Copy the payload so that no buffer is shared with `self`
    pub fn deep_copy(&self) -> ResBody {
        match self {
            ResBody::Getfh { object } => ResBody::Getfh {
                object: object.deep_copy(),
            },
            ResBody::Read { eof, data } => ResBody::Read {
                eof: *eof,
                data: Bytes::copy_from_slice(data),
            },
            ResBody::Readlink { link } => ResBody::Readlink {
                link: Bytes::copy_from_slice(link),
            },
            ResBody::ExchangeId {
                clientid,
                sequence_id,
                flags,
                server_owner,
                server_scope,
            } => ResBody::ExchangeId {
                clientid: *clientid,
                sequence_id: *sequence_id,
                flags: *flags,
                server_owner: Bytes::copy_from_slice(server_owner),
                server_scope: Bytes::copy_from_slice(server_scope),
            },
            // Plain values: a clone owns nothing shared.
            ResBody::None
            | ResBody::Access { .. }
            | ResBody::Commit { .. }
            | ResBody::Create { .. }
            | ResBody::Getattr { .. }
            | ResBody::Write { .. }
            | ResBody::Setclientid { .. }
            | ResBody::CreateSession { .. }
            | ResBody::Sequence { .. } => self.clone(),
        }
    }
}

/// Result envelope for one attempted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResult {
    pub op: OpCode,
    pub status: Nfsstat4,
    pub body: ResBody,
}

impl OpResult {
    pub fn new(op: OpCode) -> Self {
        Self {
            op,
            status: Nfsstat4::Ok,
            body: ResBody::None,
        }
    }

    /// A status-only result
    pub fn status(op: OpCode, status: Nfsstat4) -> Self {
        Self {
            op,
            status,
            body: ResBody::None,
        }
    }

    pub fn deep_copy(&self) -> OpResult {
        OpResult {
            op: self.op,
            status: self.status,
            body: self.body.deep_copy(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundResponse {
    pub status: Nfsstat4,
    pub tag: Bytes,
    pub results: Vec<OpResult>,
}

impl CompoundResponse {
    /// An empty response echoing `tag`
    pub fn new(tag: Bytes) -> Self {
        Self {
            status: Nfsstat4::Ok,
            tag,
            results: Vec::new(),
        }
    }

    pub fn deep_copy(&self) -> CompoundResponse {
        CompoundResponse {
            status: self.status,
            tag: Bytes::copy_from_slice(&self.tag),
            results: self.results.iter().map(OpResult::deep_copy).collect(),
        }
    }
}
