// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for NFSv4.1 sessions and the replay cache
//!
//! These tests verify:
//! 1. SEQUENCE placement and slot validation
//! 2. The per-session operation ceiling truncates the result list
//! 3. Retransmissions are answered from the slot cache without re-running
//!    any handler
//! 4. CREATE_SESSION replay through the client's create-session slot
//! 5. Lease reservations are released when each compound ends
//! 6. A retransmission racing the original request is told to retry
//! 7. A rebooted client loses the sessions of its previous incarnation

mod common;

use common::*;
use nfs4d_core::domain::access::AccessFlags;
use nfs4d_core::domain::client::ClientRegistry;
use nfs4d_core::domain::compound::{ArgOp, OpArgs, ResBody};
use nfs4d_core::domain::credential::Credential;
use nfs4d_core::domain::export::{Export, ExportId, ExportTable};
use nfs4d_core::domain::object::ObjectStore;
use nfs4d_core::domain::opcode::OpCode;
use nfs4d_core::domain::session::{SessionId, SessionRegistry};
use nfs4d_core::domain::status::Nfsstat4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

#[test]
fn test_sequence_must_be_first() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    let response = fixture.run(1, vec![putrootfh(), sequence(session, 1, 0, false)]);
    assert_eq!(response.status, Nfsstat4::SequencePos);
    assert_eq!(
        statuses(&response),
        vec![(OpCode::Putrootfh, Nfsstat4::Ok), (OpCode::Sequence, Nfsstat4::SequencePos)]
    );
}

#[test]
fn test_unknown_session_and_slot() {
    let fixture = Fixture::new();
    let response = fixture.run(1, vec![sequence(SessionId::generate(), 1, 0, false)]);
    assert_eq!(response.status, Nfsstat4::Badsession);

    let (session, _) = fixture.open_session(8);
    let response = fixture.run(1, vec![sequence(session, 1, 99, false)]);
    assert_eq!(response.status, Nfsstat4::Badslot);
}

#[test]
fn test_sequence_reports_slot_table() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    let response = fixture.run(1, vec![sequence(session, 1, 2, false)]);
    assert_eq!(response.status, Nfsstat4::Ok);
    match &response.results[0].body {
        ResBody::Sequence {
            session_id,
            sequence_id,
            slot_id,
            highest_slot_id,
            ..
        } => {
            assert_eq!(*session_id, session);
            assert_eq!((*sequence_id, *slot_id, *highest_slot_id), (1, 2, 3));
        }
        other => panic!("unexpected SEQUENCE body {:?}", other),
    }
}

#[test]
fn test_session_operation_ceiling_truncates() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(3);
    let response = fixture.run(
        1,
        vec![sequence(session, 1, 0, false), putrootfh(), getfh(), getfh(), getfh()],
    );
    assert_eq!(response.status, Nfsstat4::TooManyOps);
    assert_eq!(
        statuses(&response),
        vec![
            (OpCode::Sequence, Nfsstat4::Ok),
            (OpCode::Putrootfh, Nfsstat4::Ok),
            (OpCode::Getfh, Nfsstat4::Ok),
            (OpCode::Getfh, Nfsstat4::TooManyOps),
        ]
    );
}

#[test]
fn test_operation_ceiling_tags_unknown_op_codes_illegal() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(1);
    let response = fixture.run(
        1,
        vec![sequence(session, 1, 0, false), ArgOp { opcode: 7777, args: OpArgs::Void }],
    );
    assert_eq!(response.results[1].op, OpCode::Illegal);
    assert_eq!(response.results[1].status, Nfsstat4::TooManyOps);
}

#[test]
fn test_retransmission_is_served_from_cache() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    let ops = || {
        vec![
            sequence(session, 1, 0, true),
            putrootfh(),
            lookup("data"),
            mkdir("once"),
            getattr(),
        ]
    };

    let first = fixture.run(1, ops());
    assert_eq!(first.status, Nfsstat4::Ok);
    let root = fixture.store.root(ExportId(1)).unwrap();
    let change = root.attrs().change;

    // CREATE would fail with EXIST if it ran again
    let replay = fixture.run(1, ops());
    assert_eq!(replay, first);
    assert_eq!(root.attrs().change, change);

    let third = fixture.run(1, ops());
    assert_eq!(third, first);
}

#[test]
fn test_failed_compound_is_cached_too() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    let ops = || vec![sequence(session, 1, 0, true), putrootfh(), lookup("missing")];

    let first = fixture.run(1, ops());
    assert_eq!(first.status, Nfsstat4::Noent);
    let replay = fixture.run(1, ops());
    assert_eq!(replay, first);
}

#[test]
fn test_uncached_retransmission() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    let first = fixture.run(1, vec![sequence(session, 1, 0, false), putrootfh()]);
    assert_eq!(first.status, Nfsstat4::Ok);

    let replay = fixture.run(1, vec![sequence(session, 1, 0, false), putrootfh()]);
    assert_eq!(replay.status, Nfsstat4::RetryUncachedRep);
    assert_eq!(
        statuses(&replay),
        vec![(OpCode::Sequence, Nfsstat4::RetryUncachedRep)]
    );
}

#[test]
fn test_new_request_replaces_cached_reply() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    let first = fixture.run(1, vec![sequence(session, 1, 0, true), putrootfh()]);
    let second = fixture.run(1, vec![sequence(session, 2, 0, true), putrootfh(), getfh()]);
    assert_eq!(second.results.len(), 3);

    let replay = fixture.run(1, vec![sequence(session, 2, 0, true), putrootfh(), getfh()]);
    assert_eq!(replay, second);
    assert_ne!(replay, first);
}

#[test]
fn test_misordered_sequence() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    fixture.run(1, vec![sequence(session, 1, 0, false)]);

    let response = fixture.run(1, vec![sequence(session, 3, 0, false)]);
    assert_eq!(response.status, Nfsstat4::SeqMisordered);

    // Slots advance independently
    let response = fixture.run(1, vec![sequence(session, 1, 1, false)]);
    assert_eq!(response.status, Nfsstat4::Ok);
}

#[test]
fn test_create_session_replay() {
    let fixture = Fixture::new();
    let response = fixture.run(1, vec![exchange_id(b"replayer", [5; 8])]);
    let (clientid, sequence_id) = match &response.results[0].body {
        ResBody::ExchangeId {
            clientid, sequence_id, ..
        } => (*clientid, *sequence_id),
        other => panic!("unexpected EXCHANGE_ID body {:?}", other),
    };

    let first = fixture.run(1, vec![create_session(clientid, sequence_id, 8)]);
    assert_eq!(first.status, Nfsstat4::Ok);
    let replay = fixture.run(1, vec![create_session(clientid, sequence_id, 8)]);
    assert_eq!(replay, first);
    assert_eq!(fixture.sessions.count(), 1);

    let misordered = fixture.run(1, vec![create_session(clientid, sequence_id + 5, 8)]);
    assert_eq!(misordered.status, Nfsstat4::SeqMisordered);

    // The client is confirmed by its first session
    let response = fixture.run(1, vec![exchange_id(b"replayer", [5; 8])]);
    match &response.results[0].body {
        ResBody::ExchangeId { flags, sequence_id: next, .. } => {
            assert_ne!(flags & 0x8000_0000, 0);
            assert_eq!(*next, sequence_id + 1);
        }
        other => panic!("unexpected EXCHANGE_ID body {:?}", other),
    }
}

#[test]
fn test_create_session_for_unknown_client() {
    let fixture = Fixture::new();
    let response = fixture.run(
        1,
        vec![create_session(nfs4d_core::domain::client::ClientId(12345), 1, 8)],
    );
    assert_eq!(response.status, Nfsstat4::StaleClientid);
}

#[test]
fn test_destroy_session() {
    let fixture = Fixture::new();
    let (session, _) = fixture.open_session(8);
    let destroy = || ArgOp::new(OpCode::DestroySession, OpArgs::DestroySession { session_id: session });

    assert_eq!(fixture.run(1, vec![destroy()]).status, Nfsstat4::Ok);
    assert!(fixture.sessions.lookup(&session).is_none());
    assert_eq!(fixture.run(1, vec![destroy()]).status, Nfsstat4::Badsession);
    assert_eq!(
        fixture.run(1, vec![sequence(session, 1, 0, false)]).status,
        Nfsstat4::Badsession
    );
}

#[test]
fn test_reclaim_complete() {
    let fixture = Fixture::new();
    let reclaim = || ArgOp::new(OpCode::ReclaimComplete, OpArgs::ReclaimComplete { one_fs: false });

    assert_eq!(fixture.run(1, vec![reclaim()]).status, Nfsstat4::OpNotInSession);

    let (session, _) = fixture.open_session(8);
    let response = fixture.run(1, vec![sequence(session, 1, 0, false), reclaim()]);
    assert_eq!(response.status, Nfsstat4::Ok);
    let response = fixture.run(1, vec![sequence(session, 2, 0, false), reclaim()]);
    assert_eq!(response.status, Nfsstat4::CompleteAlready);
}

#[test]
fn test_sequence_lease_is_released() {
    let fixture = Fixture::new();
    let (session, clientid) = fixture.open_session(8);
    fixture.run(1, vec![sequence(session, 1, 0, false), putrootfh(), lookup("missing")]);
    fixture.run(1, vec![sequence(session, 2, 0, false), putrootfh()]);

    let client = fixture.clients.get(clientid).unwrap();
    assert_eq!(client.lease().reservations(), 0);
}

/// Holds the first permission check on `/data` until the test lets it go
struct Gate {
    armed: AtomicBool,
    barrier: Barrier,
}

struct GatedExport {
    inner: Arc<dyn ExportTable>,
    gate: Arc<Gate>,
}

impl ExportTable for GatedExport {
    fn get(&self, id: ExportId) -> Option<Arc<Export>> {
        self.inner.get(id)
    }

    fn exports(&self) -> Vec<Arc<Export>> {
        self.inner.exports()
    }

    fn permissions(&self, export: &Export, credential: &Credential) -> AccessFlags {
        if export.id == ExportId(1) && self.gate.armed.swap(false, Ordering::SeqCst) {
            // Entered, then released
            self.gate.barrier.wait();
            self.gate.barrier.wait();
        }
        self.inner.permissions(export, credential)
    }
}

#[test]
fn test_retransmission_while_in_progress_is_delayed() {
    let gate = Arc::new(Gate {
        armed: AtomicBool::new(false),
        barrier: Barrier::new(2),
    });
    let fixture = Fixture::with_exports(|inner| {
        Arc::new(GatedExport {
            inner,
            gate: gate.clone(),
        })
    });
    let (session, _) = fixture.open_session(8);
    let ops = || vec![sequence(session, 1, 0, true), putrootfh(), lookup("data"), getattr()];

    gate.armed.store(true, Ordering::SeqCst);
    let first = std::thread::scope(|scope| {
        let original = scope.spawn(|| fixture.run(1, ops()));
        gate.barrier.wait();

        let early = fixture.run(1, ops());
        assert_eq!(early.status, Nfsstat4::Delay);
        assert_eq!(statuses(&early), vec![(OpCode::Sequence, Nfsstat4::Delay)]);

        gate.barrier.wait();
        original.join().unwrap()
    });
    assert_eq!(first.status, Nfsstat4::Ok);
    assert_eq!(first.results.len(), 4);

    let replay = fixture.run(1, ops());
    assert_eq!(replay, first);

    let next = fixture.run(1, vec![sequence(session, 2, 0, false), putrootfh()]);
    assert_eq!(next.status, Nfsstat4::Ok);
}

#[test]
fn test_rebooted_client_loses_old_sessions() {
    let fixture = Fixture::new();
    let (session, clientid) = fixture.open_session(8);
    let (other, _) = fixture.open_session(8);
    assert_eq!(fixture.sessions.count(), 2);

    // Same owner, new verifier
    let response = fixture.run(1, vec![exchange_id(b"client-owner", [8; 8])]);
    assert_eq!(response.status, Nfsstat4::Ok);
    match &response.results[0].body {
        ResBody::ExchangeId { clientid: new_id, flags, .. } => {
            assert_ne!(*new_id, clientid);
            assert_eq!(flags & 0x8000_0000, 0);
        }
        other => panic!("unexpected EXCHANGE_ID body {:?}", other),
    }

    assert_eq!(fixture.sessions.count(), 0);
    assert!(fixture.clients.get(clientid).is_none());
    for old in [session, other] {
        let response = fixture.run(1, vec![sequence(old, 1, 0, false)]);
        assert_eq!(response.status, Nfsstat4::Badsession);
    }
}
