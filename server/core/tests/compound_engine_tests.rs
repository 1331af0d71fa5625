// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the compound execution engine
//!
//! These tests verify:
//! 1. Entry rejections (minor version, empty, oversized, non-solo EXCHANGE_ID,
//!    malformed credential)
//! 2. The per-op loop: stop on first failure, file-handle and export gates
//! 3. Operation resolution: illegal and unsupported op codes
//! 4. Handler behavior end to end over the in-memory store

mod common;

use bytes::Bytes;
use common::*;
use nfs4d_core::application::CompoundError;
use nfs4d_core::domain::access::AccessFlags;
use nfs4d_core::domain::client::ClientRegistry;
use nfs4d_core::domain::compound::{ArgOp, OpArgs, ResBody, NFS4_MAX_OPERATIONS};
use nfs4d_core::domain::credential::{Credential, CredentialError, OpaqueAuth, RpcRequest};
use nfs4d_core::domain::export::{Export, ExportId, ExportTable};
use nfs4d_core::domain::file_handle::FileHandle;
use nfs4d_core::domain::object::ObjectKind;
use nfs4d_core::domain::opcode::OpCode;
use nfs4d_core::domain::status::Nfsstat4;
use std::sync::Arc;

#[test]
fn test_bad_minor_version_is_rejected_with_tag() {
    let fixture = Fixture::new();
    let response = fixture.run(2, vec![putrootfh()]);
    assert_eq!(response.status, Nfsstat4::MinorVersMismatch);
    assert!(response.results.is_empty());
    assert_eq!(response.tag, Bytes::from_static(b"integration"));
}

#[test]
fn test_empty_compound_succeeds() {
    let fixture = Fixture::new();
    let response = fixture.run(0, Vec::new());
    assert_eq!(response.status, Nfsstat4::Ok);
    assert!(response.results.is_empty());
}

#[test]
fn test_oversized_compound_is_rejected() {
    let fixture = Fixture::new();
    let ops: Vec<ArgOp> = (0..=NFS4_MAX_OPERATIONS).map(|_| putrootfh()).collect();
    let response = fixture.run(0, ops);
    assert_eq!(response.status, Nfsstat4::Resource);
    assert!(response.results.is_empty());

    let ops: Vec<ArgOp> = (0..NFS4_MAX_OPERATIONS).map(|_| putrootfh()).collect();
    let response = fixture.run(0, ops);
    assert_eq!(response.status, Nfsstat4::Ok);
    assert_eq!(response.results.len(), NFS4_MAX_OPERATIONS);
}

#[test]
fn test_exchange_id_must_be_alone() {
    let fixture = Fixture::new();
    let response = fixture.run(1, vec![exchange_id(b"owner", [1; 8]), putrootfh()]);
    assert_eq!(response.status, Nfsstat4::NotOnlyOp);
    assert_eq!(statuses(&response), vec![(OpCode::ExchangeId, Nfsstat4::NotOnlyOp)]);
    assert_eq!(fixture.clients.count(), 0);
}

#[test]
fn test_malformed_credential_drops_request() {
    let fixture = Fixture::new();
    let request = RpcRequest {
        xid: 9,
        auth: OpaqueAuth {
            flavor: 99,
            body: Bytes::new(),
        },
        client_addr: None,
    };
    let err = fixture
        .engine
        .process(&request, compound(0, vec![putrootfh()]))
        .unwrap_err();
    assert!(matches!(
        err,
        CompoundError::MalformedCredential(CredentialError::UnsupportedFlavor(99))
    ));
}

#[test]
fn test_lookup_and_read_through_junction() {
    let fixture = Fixture::new();
    let response = fixture.run(
        0,
        vec![putrootfh(), lookup("data"), lookup("hello.txt"), getattr(), read(0, 1024)],
    );
    assert_eq!(response.status, Nfsstat4::Ok);
    assert_eq!(response.results.len(), 5);

    match &response.results[3].body {
        ResBody::Getattr { attrs } => {
            assert_eq!(attrs.kind, ObjectKind::Regular);
            assert_eq!(attrs.size, HELLO.len() as u64);
            assert_eq!(attrs.fileid, fixture.hello.id.0);
        }
        other => panic!("unexpected GETATTR body {:?}", other),
    }
    match &response.results[4].body {
        ResBody::Read { eof, data } => {
            assert!(*eof);
            assert_eq!(&data[..], HELLO);
        }
        other => panic!("unexpected READ body {:?}", other),
    }
}

#[test]
fn test_first_failure_ends_compound() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![putrootfh(), lookup("missing"), getattr()]);
    assert_eq!(response.status, Nfsstat4::Noent);
    assert_eq!(
        statuses(&response),
        vec![(OpCode::Putrootfh, Nfsstat4::Ok), (OpCode::Lookup, Nfsstat4::Noent)]
    );
}

#[test]
fn test_missing_current_handle() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![getattr(), putrootfh()]);
    assert_eq!(response.status, Nfsstat4::Nofilehandle);
    assert_eq!(statuses(&response), vec![(OpCode::Getattr, Nfsstat4::Nofilehandle)]);

    // GETFH needs no export access, so the handler itself reports it
    let response = fixture.run(0, vec![getfh()]);
    assert_eq!(statuses(&response), vec![(OpCode::Getfh, Nfsstat4::Nofilehandle)]);
}

#[test]
fn test_modify_on_read_only_export_is_rofs() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![putrootfh(), lookup("ro"), mkdir("new")]);
    assert_eq!(response.status, Nfsstat4::Rofs);
    assert_eq!(response.results.last().map(|r| r.op), Some(OpCode::Create));

    // The pseudo filesystem is read-only metadata
    let response = fixture.run(0, vec![putrootfh(), mkdir("new")]);
    assert_eq!(response.status, Nfsstat4::Rofs);
}

#[test]
fn test_data_read_on_metadata_only_export_is_access() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![putrootfh(), lookup("meta"), lookup("m.txt"), read(0, 4)]);
    assert_eq!(response.status, Nfsstat4::Access);
    assert_eq!(response.results.len(), 4);
    assert_eq!(response.results[3].op, OpCode::Read);
}

/// Export table that grants nothing on one export
struct DenyExport {
    inner: Arc<dyn ExportTable>,
    denied: ExportId,
}

impl ExportTable for DenyExport {
    fn get(&self, id: ExportId) -> Option<Arc<Export>> {
        self.inner.get(id)
    }

    fn exports(&self) -> Vec<Arc<Export>> {
        self.inner.exports()
    }

    fn permissions(&self, export: &Export, credential: &Credential) -> AccessFlags {
        if export.id == self.denied {
            AccessFlags::empty()
        } else {
            self.inner.permissions(export, credential)
        }
    }
}

#[test]
fn test_export_table_permissions_gate_lookup() {
    let fixture = Fixture::with_exports(|inner| {
        Arc::new(DenyExport {
            inner,
            denied: ExportId(1),
        })
    });
    // Crossing the junction succeeds; the next op needs metadata access
    let response = fixture.run(0, vec![putrootfh(), lookup("data"), lookup("hello.txt")]);
    assert_eq!(response.status, Nfsstat4::Access);
    assert_eq!(
        statuses(&response),
        vec![
            (OpCode::Putrootfh, Nfsstat4::Ok),
            (OpCode::Lookup, Nfsstat4::Ok),
            (OpCode::Lookup, Nfsstat4::Access),
        ]
    );
}

#[test]
fn test_illegal_op_codes() {
    let fixture = Fixture::new();
    for raw in [0u32, 2, 10044, 9999] {
        let response = fixture.run(0, vec![ArgOp { opcode: raw, args: OpArgs::Void }]);
        assert_eq!(response.status, Nfsstat4::OpIllegal, "op code {}", raw);
        assert_eq!(statuses(&response), vec![(OpCode::Illegal, Nfsstat4::OpIllegal)]);
    }

    // SEQUENCE is not part of the 4.0 dialect
    let response = fixture.run(0, vec![ArgOp::new(OpCode::Sequence, OpArgs::Void)]);
    assert_eq!(statuses(&response), vec![(OpCode::Illegal, Nfsstat4::OpIllegal)]);
}

#[test]
fn test_unsupported_op_keeps_its_code() {
    let fixture = Fixture::new();
    let response = fixture.run(
        0,
        vec![putrootfh(), ArgOp::new(OpCode::Open, OpArgs::Opaque(Bytes::from_static(b"open")))],
    );
    assert_eq!(response.status, Nfsstat4::Notsupp);
    assert_eq!(response.results[1].op, OpCode::Open);
}

#[test]
fn test_save_and_restore_handles() {
    let fixture = Fixture::new();
    let response = fixture.run(
        0,
        vec![putrootfh(), getfh(), savefh(), lookup("data"), restorefh(), getfh()],
    );
    assert_eq!(response.status, Nfsstat4::Ok);
    assert_eq!(response.results[1].body, response.results[5].body);

    let response = fixture.run(0, vec![putrootfh(), restorefh()]);
    assert_eq!(response.status, Nfsstat4::Restorefh);
}

#[test]
fn test_lookupp_climbs_out_of_export() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![putrootfh(), getfh(), lookup("data"), lookupp(), getfh()]);
    assert_eq!(response.status, Nfsstat4::Ok);
    assert_eq!(response.results[1].body, response.results[4].body);

    let response = fixture.run(0, vec![putrootfh(), lookupp()]);
    assert_eq!(response.status, Nfsstat4::Noent);
}

#[test]
fn test_putfh_round_trip_and_bad_handles() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![putrootfh(), lookup("data"), lookup("hello.txt"), getfh()]);
    let handle = match &response.results[3].body {
        ResBody::Getfh { object } => object.clone(),
        other => panic!("unexpected GETFH body {:?}", other),
    };

    let response = fixture.run(
        0,
        vec![ArgOp::new(OpCode::Putfh, OpArgs::Putfh { object: handle }), read(6, 5)],
    );
    match &response.results[1].body {
        ResBody::Read { data, .. } => assert_eq!(&data[..], b"world"),
        other => panic!("unexpected READ body {:?}", other),
    }

    let garbage = FileHandle::from_wire(Bytes::from_static(b"not a handle"));
    let response = fixture.run(0, vec![ArgOp::new(OpCode::Putfh, OpArgs::Putfh { object: garbage })]);
    assert_eq!(response.status, Nfsstat4::Badhandle);
}

#[test]
fn test_create_uses_caller_identity() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![putrootfh(), lookup("data"), mkdir("projects"), getattr()]);
    assert_eq!(response.status, Nfsstat4::Ok);
    match &response.results[2].body {
        ResBody::Create { cinfo } => assert!(cinfo.after > cinfo.before),
        other => panic!("unexpected CREATE body {:?}", other),
    }
    match &response.results[3].body {
        ResBody::Getattr { attrs } => {
            assert_eq!(attrs.kind, ObjectKind::Directory);
            assert_eq!((attrs.uid, attrs.gid), (1000, 100));
        }
        other => panic!("unexpected GETATTR body {:?}", other),
    }

    let response = fixture.run(0, vec![putrootfh(), lookup("data"), mkdir("projects")]);
    assert_eq!(response.status, Nfsstat4::Exist);
}

#[test]
fn test_write_then_read_on_data_server_export() {
    let fixture = Fixture::new();
    let response = fixture.run(
        0,
        vec![putrootfh(), lookup("ds"), lookup("blob"), getfh(), write(0, b"AB"), read(0, 4)],
    );
    assert_eq!(response.status, Nfsstat4::Ok);

    match &response.results[3].body {
        ResBody::Getfh { object } => assert!(object.decode().unwrap().is_data_server()),
        other => panic!("unexpected GETFH body {:?}", other),
    }
    match &response.results[4].body {
        ResBody::Write { count, .. } => assert_eq!(*count, 2),
        other => panic!("unexpected WRITE body {:?}", other),
    }
    match &response.results[5].body {
        ResBody::Read { data, eof } => {
            assert_eq!(&data[..], b"AB23");
            assert!(!*eof);
        }
        other => panic!("unexpected READ body {:?}", other),
    }
}

#[test]
fn test_read_directory_is_isdir() {
    let fixture = Fixture::new();
    let response = fixture.run(0, vec![putrootfh(), lookup("data"), read(0, 10)]);
    assert_eq!(response.status, Nfsstat4::Isdir);
}

#[test]
fn test_v40_client_id_and_renew() {
    let fixture = Fixture::new();
    let response = fixture.run(
        0,
        vec![ArgOp::new(
            OpCode::Setclientid,
            OpArgs::Setclientid {
                verifier: [3; 8],
                owner: Bytes::from_static(b"v40-client"),
            },
        )],
    );
    let (clientid, confirm) = match &response.results[0].body {
        ResBody::Setclientid { clientid, confirm } => (*clientid, *confirm),
        other => panic!("unexpected SETCLIENTID body {:?}", other),
    };

    let renew = || ArgOp::new(OpCode::Renew, OpArgs::Renew { clientid });

    // Unconfirmed clients cannot renew
    assert_eq!(fixture.run(0, vec![renew()]).status, Nfsstat4::StaleClientid);

    let response = fixture.run(
        0,
        vec![ArgOp::new(
            OpCode::SetclientidConfirm,
            OpArgs::SetclientidConfirm { clientid, confirm },
        )],
    );
    assert_eq!(response.status, Nfsstat4::Ok);

    let response = fixture.run(0, vec![renew()]);
    assert_eq!(response.status, Nfsstat4::Ok);

    let client = fixture.clients.get(clientid).unwrap();
    assert_eq!(client.lease().reservations(), 0);
}
