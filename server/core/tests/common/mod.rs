// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixture for the engine integration tests
//!
//! Exports:
//! - 1 `/data` rw, holding `hello.txt`
//! - 2 `/ro` read-only
//! - 3 `/ds` served as data-server objects, holding `blob`
//! - 4 `/meta` metadata-only, holding `m.txt`

#![allow(dead_code)]

use bytes::Bytes;
use nfs4d_core::application::{CompoundEngine, ServerState};
use nfs4d_core::domain::access::AccessType;
use nfs4d_core::domain::client::ClientId;
use nfs4d_core::domain::compound::{ArgOp, CompoundRequest, CompoundResponse, OpArgs, ResBody};
use nfs4d_core::domain::credential::{OpaqueAuth, RpcRequest, ANON_GID, ANON_UID};
use nfs4d_core::domain::export::{ExportId, ExportTable};
use nfs4d_core::domain::object::CacheEntry;
use nfs4d_core::domain::opcode::OpCode;
use nfs4d_core::domain::server_config::{ExportConfig, ServerConfig};
use nfs4d_core::domain::session::{ChannelAttrs, SessionId};
use nfs4d_core::domain::status::Nfsstat4;
use nfs4d_core::infrastructure::{
    InMemoryClientRegistry, InMemorySessionRegistry, MemoryStore, PseudoFsTree, StaticExportTable,
};
use std::sync::Arc;

pub const HELLO: &[u8] = b"hello world";

pub struct Fixture {
    pub engine: CompoundEngine,
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<InMemorySessionRegistry>,
    pub clients: Arc<InMemoryClientRegistry>,
    pub hello: Arc<CacheEntry>,
    pub blob: Arc<CacheEntry>,
}

fn export(export_id: u16, pseudo_path: &str, access: AccessType, data_server: bool) -> ExportConfig {
    ExportConfig {
        export_id,
        path: format!("/srv{}", pseudo_path),
        pseudo_path: pseudo_path.to_string(),
        access,
        clients: Vec::new(),
        data_server,
        anonymous_uid: ANON_UID,
        anonymous_gid: ANON_GID,
    }
}

pub fn config() -> ServerConfig {
    ServerConfig {
        exports: vec![
            export(1, "/data", AccessType::Rw, false),
            export(2, "/ro", AccessType::Ro, false),
            export(3, "/ds", AccessType::Rw, true),
            export(4, "/meta", AccessType::Mdonly, false),
        ],
        ..Default::default()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_exports(|table| table)
    }

    /// Build the fixture, letting the caller wrap the export table
    pub fn with_exports(wrap: impl FnOnce(Arc<dyn ExportTable>) -> Arc<dyn ExportTable>) -> Self {
        let config = config();
        let table = Arc::new(StaticExportTable::from_config(&config).unwrap());
        let store = Arc::new(MemoryStore::new());
        let pseudo_fs = Arc::new(PseudoFsTree::build(&store, &table.exports()).unwrap());

        let hello = store.insert_file(&store.ensure_root(ExportId(1)), "hello.txt", HELLO).unwrap();
        let blob = store.insert_file(&store.ensure_root(ExportId(3)), "blob", b"0123456789".to_vec()).unwrap();
        store.insert_file(&store.ensure_root(ExportId(4)), "m.txt", b"meta".to_vec()).unwrap();

        let sessions = Arc::new(InMemorySessionRegistry::new());
        let clients = Arc::new(InMemoryClientRegistry::with_epoch(42));
        let state = Arc::new(ServerState::new(
            wrap(table),
            store.clone(),
            pseudo_fs,
            sessions.clone(),
            clients.clone(),
            &config,
        ));

        Self {
            engine: CompoundEngine::new(state),
            store,
            sessions,
            clients,
            hello,
            blob,
        }
    }

    pub fn run(&self, minor_version: u32, ops: Vec<ArgOp>) -> CompoundResponse {
        self.engine
            .process(&sys_request(), compound(minor_version, ops))
            .unwrap()
    }

    /// EXCHANGE_ID + CREATE_SESSION, returning the new session and its client
    pub fn open_session(&self, max_operations: u32) -> (SessionId, ClientId) {
        let response = self.run(1, vec![exchange_id(b"client-owner", [7; 8])]);
        assert_eq!(response.status, Nfsstat4::Ok);
        let (clientid, sequence_id) = match &response.results[0].body {
            ResBody::ExchangeId {
                clientid, sequence_id, ..
            } => (*clientid, *sequence_id),
            other => panic!("unexpected EXCHANGE_ID body {:?}", other),
        };

        let response = self.run(1, vec![create_session(clientid, sequence_id, max_operations)]);
        assert_eq!(response.status, Nfsstat4::Ok);
        match &response.results[0].body {
            ResBody::CreateSession { session_id, .. } => (*session_id, clientid),
            other => panic!("unexpected CREATE_SESSION body {:?}", other),
        }
    }
}

pub fn sys_request() -> RpcRequest {
    RpcRequest {
        xid: 1,
        auth: OpaqueAuth::sys("client.example", 1000, 100, &[100]),
        client_addr: Some("10.0.0.5:700".parse().unwrap()),
    }
}

pub fn compound(minor_version: u32, ops: Vec<ArgOp>) -> CompoundRequest {
    CompoundRequest {
        minor_version,
        tag: Bytes::from_static(b"integration"),
        ops,
    }
}

pub fn op(opcode: OpCode, args: OpArgs) -> ArgOp {
    ArgOp::new(opcode, args)
}

pub fn putrootfh() -> ArgOp {
    op(OpCode::Putrootfh, OpArgs::Void)
}

pub fn getfh() -> ArgOp {
    op(OpCode::Getfh, OpArgs::Void)
}

pub fn getattr() -> ArgOp {
    op(OpCode::Getattr, OpArgs::Void)
}

pub fn savefh() -> ArgOp {
    op(OpCode::Savefh, OpArgs::Void)
}

pub fn restorefh() -> ArgOp {
    op(OpCode::Restorefh, OpArgs::Void)
}

pub fn lookupp() -> ArgOp {
    op(OpCode::Lookupp, OpArgs::Void)
}

pub fn lookup(name: &str) -> ArgOp {
    op(OpCode::Lookup, OpArgs::Lookup { name: name.to_string() })
}

pub fn read(offset: u64, count: u32) -> ArgOp {
    op(OpCode::Read, OpArgs::Read { offset, count })
}

pub fn write(offset: u64, data: &'static [u8]) -> ArgOp {
    op(
        OpCode::Write,
        OpArgs::Write {
            offset,
            stable: Default::default(),
            data: Bytes::from_static(data),
        },
    )
}

pub fn mkdir(name: &str) -> ArgOp {
    op(
        OpCode::Create,
        OpArgs::Create {
            kind: nfs4d_core::domain::compound::CreateKind::Directory,
            name: name.to_string(),
        },
    )
}

pub fn exchange_id(owner: &'static [u8], verifier: [u8; 8]) -> ArgOp {
    op(
        OpCode::ExchangeId,
        OpArgs::ExchangeId {
            verifier,
            owner: Bytes::from_static(owner),
            flags: 0,
        },
    )
}

pub fn channel_attrs(max_operations: u32) -> ChannelAttrs {
    ChannelAttrs {
        header_pad_size: 0,
        max_request_size: 1 << 20,
        max_response_size: 1 << 20,
        max_response_size_cached: 1 << 16,
        max_operations,
        max_requests: 4,
    }
}

pub fn create_session(clientid: ClientId, sequence: u32, max_operations: u32) -> ArgOp {
    op(
        OpCode::CreateSession,
        OpArgs::CreateSession {
            clientid,
            sequence,
            flags: 0,
            fore_attrs: channel_attrs(max_operations),
        },
    )
}

pub fn sequence(session_id: SessionId, sequence_id: u32, slot_id: u32, cache_this: bool) -> ArgOp {
    op(
        OpCode::Sequence,
        OpArgs::Sequence {
            session_id,
            sequence_id,
            slot_id,
            highest_slot_id: 0,
            cache_this,
        },
    )
}

pub fn statuses(response: &CompoundResponse) -> Vec<(OpCode, Nfsstat4)> {
    response.results.iter().map(|r| (r.op, r.status)).collect()
}
