// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-compound mutable state
//!
//! A [`CompoundContext`] is created when a compound enters the engine and is
//! exclusively owned by the dispatch loop and the handler it is currently
//! running. Handlers may:
//!
//! - replace the current position (PUTFH, PUTROOTFH, LOOKUP, ...)
//! - copy between current and saved positions (SAVEFH, RESTOREFH)
//! - bind a session (SEQUENCE)
//! - reserve a client lease (SEQUENCE, RENEW)
//! - claim a replay slot and set the replay decision (SEQUENCE,
//!   CREATE_SESSION)
//!
//! Every reference the context holds is an `Arc` released when the context is
//! dropped, whichever way the compound ended.

use crate::application::server_state::ServerState;
use crate::domain::access::AccessFlags;
use crate::domain::client::ClientRecord;
use crate::domain::compound::CompoundResponse;
use crate::domain::credential::Credential;
use crate::domain::export::Export;
use crate::domain::file_handle::{FileHandle, HandleBody};
use crate::domain::object::{CacheEntry, ObjectKind, ObjectRef};
use crate::domain::opcode::MinorVersion;
use crate::domain::session::{InFlight, Session};
use crate::domain::status::Nfsstat4;
use std::sync::Arc;
use tracing::{error, trace};

/// A file-handle position: the handle, its backing object and its export
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub fh: FileHandle,
    pub object: ObjectRef,
    pub export: Option<Arc<Export>>,
    /// Access the export grants this caller
    pub permissions: AccessFlags,
}

/// What the engine must do with the replay cache once the loop ends
#[derive(Debug, Default)]
pub enum ReplayState {
    #[default]
    None,
    /// Store a copy of the finished response into the claimed slot
    Store,
    /// Retransmission: answer with this copy of the cached response
    Serve(CompoundResponse),
}

pub struct CompoundContext<'a> {
    pub state: &'a ServerState,
    pub minor_version: MinorVersion,
    pub credential: Credential,
    /// Index of the op being executed
    pub op_index: usize,
    pub op_count: usize,
    pub current: Position,
    pub saved: Position,
    pub root_fh: FileHandle,
    pub session: Option<Arc<Session>>,
    pub replay: ReplayState,
    reserved_lease: Option<Arc<ClientRecord>>,
    in_flight: Option<InFlight>,
}

impl<'a> CompoundContext<'a> {
    pub fn new(state: &'a ServerState, minor_version: MinorVersion, credential: Credential, op_count: usize) -> Self {
        Self {
            state,
            minor_version,
            credential,
            op_index: 0,
            op_count,
            current: Position::default(),
            saved: Position::default(),
            root_fh: state.pseudo_fs.root_handle(),
            session: None,
            replay: ReplayState::None,
            reserved_lease: None,
            in_flight: None,
        }
    }

    /// Make `entry` the current object, minting its handle
    pub fn set_current_entry(&mut self, entry: Arc<CacheEntry>) -> Result<(), Nfsstat4> {
        let export = match &self.current.export {
            Some(export) if export.id == entry.export_id => export.clone(),
            _ => self.state.exports.get(entry.export_id).ok_or(Nfsstat4::Stale)?,
        };

        let (body, object) = if export.data_server && entry.kind() == ObjectKind::Regular {
            let ds = self.state.objects.data_server(entry.export_id, entry.id)?;
            (HandleBody::data_server(entry.export_id, entry.id), ObjectRef::DataServer(ds))
        } else {
            (HandleBody::new(entry.export_id, entry.id), ObjectRef::Cache(entry))
        };

        let fh = FileHandle::encode(&body).map_err(|e| {
            error!("Failed to mint file handle: {}", e);
            Nfsstat4::Serverfault
        })?;

        self.bind(fh, object, export);
        Ok(())
    }

    /// Make a client-supplied handle current
    pub fn set_current_handle(&mut self, fh: FileHandle) -> Result<(), Nfsstat4> {
        let status = fh.check();
        if !status.is_ok() {
            return Err(status);
        }
        let body = fh.decode().map_err(|_| Nfsstat4::Badhandle)?;
        let export = self.state.exports.get(body.export_id).ok_or(Nfsstat4::Stale)?;

        let object = if body.is_data_server() {
            ObjectRef::DataServer(self.state.objects.data_server(body.export_id, body.object_id)?)
        } else {
            ObjectRef::Cache(self.state.objects.get(body.export_id, body.object_id)?)
        };

        self.bind(fh, object, export);
        Ok(())
    }

    fn bind(&mut self, fh: FileHandle, object: ObjectRef, export: Arc<Export>) {
        let permissions = self.state.exports.permissions(&export, &self.credential);
        self.current = Position {
            fh,
            object,
            export: Some(export),
            permissions,
        };
    }

    /// Export permission snapshot consulted by the engine's gate
    pub fn permissions(&self) -> AccessFlags {
        self.current.permissions
    }

    /// Metadata entry behind the current handle
    pub fn current_entry(&self) -> Result<Arc<CacheEntry>, Nfsstat4> {
        if self.current.fh.is_empty() {
            return Err(Nfsstat4::Nofilehandle);
        }
        self.current.object.entry().cloned().ok_or(Nfsstat4::Nofilehandle)
    }

    pub fn save(&mut self) {
        self.saved = self.current.clone();
    }

    pub fn restore(&mut self) -> Result<(), Nfsstat4> {
        if self.saved.fh.is_empty() {
            return Err(Nfsstat4::Restorefh);
        }
        self.current = self.saved.clone();
        Ok(())
    }

    pub fn bind_session(&mut self, session: Arc<Session>) {
        self.session = Some(session);
    }

    /// Hold `client`'s lease for the rest of the compound. A lease reserved
    /// earlier in the same compound is renewed first so only one is held.
    pub fn reserve_lease(&mut self, client: Arc<ClientRecord>) {
        if let Some(previous) = self.reserved_lease.take() {
            previous.lease().renew();
        }
        client.lease().reserve();
        self.reserved_lease = Some(client);
    }

    pub(crate) fn take_reserved_lease(&mut self) -> Option<Arc<ClientRecord>> {
        self.reserved_lease.take()
    }

    /// Remember the slot this compound claimed; it is released when the
    /// compound finishes
    pub fn claim_slot(&mut self, in_flight: InFlight) {
        if let Some(previous) = self.in_flight.replace(in_flight) {
            previous.complete(None);
        }
    }

    pub(crate) fn take_in_flight(&mut self) -> Option<InFlight> {
        self.in_flight.take()
    }

    pub fn has_reserved_lease(&self) -> bool {
        self.reserved_lease.is_some()
    }

    pub fn log_handles(&self) {
        trace!(
            op_index = self.op_index,
            current = ?self.current.fh,
            saved = ?self.saved.fh,
            "Compound file handles"
        );
    }
}

impl Drop for CompoundContext<'_> {
    fn drop(&mut self) {
        // Only reached with a reservation or a claim when the loop did not
        // complete.
        if let Some(client) = self.reserved_lease.take() {
            client.lease().renew();
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.complete(None);
        }
        trace!(op_index = self.op_index, "Compound context released");
    }
}
