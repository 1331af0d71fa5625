// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory session and client registries
//!
//! Thread-safe `HashMap`-backed tables. State does not survive a restart; a
//! restarted server answers old client ids with `STALE_CLIENTID` and old
//! sessions with `BADSESSION`.

use crate::domain::client::{ClientId, ClientRecord, ClientRegistry, ExchangedClient, Verifier};
use crate::domain::session::{ChannelAttrs, Session, SessionId, SessionRegistry};
use crate::domain::status::Nfsstat4;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemorySessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl InMemorySessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    fn create(&self, client_id: ClientId, fore_attrs: ChannelAttrs) -> Arc<Session> {
        let session = Arc::new(Session::new(SessionId::generate(), client_id, fore_attrs));
        self.sessions.write().insert(session.id, session.clone());
        debug!(session_id = %session.id, client_id = %client_id, "Registered session");
        session
    }

    fn lookup(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    fn destroy(&self, id: &SessionId) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    fn destroy_client_sessions(&self, client_id: ClientId) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.client_id != client_id);
        before - sessions.len()
    }
}

/// Client ids are the boot epoch in the high word and a counter in the low
/// word, so ids from an earlier server instance never collide.
#[derive(Clone)]
pub struct InMemoryClientRegistry {
    clients: Arc<RwLock<HashMap<ClientId, Arc<ClientRecord>>>>,
    epoch: u32,
    counter: Arc<AtomicU32>,
}

impl InMemoryClientRegistry {
    pub fn new() -> Self {
        Self::with_epoch(Utc::now().timestamp() as u32)
    }

    pub fn with_epoch(epoch: u32) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            epoch,
            counter: Arc::new(AtomicU32::new(1)),
        }
    }

    pub fn count(&self) -> usize {
        self.clients.read().len()
    }

    fn next_id(&self) -> ClientId {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        ClientId(((self.epoch as u64) << 32) | counter as u64)
    }

    fn insert(&self, owner: Bytes, verifier: Verifier, minor_version: u32) -> Arc<ClientRecord> {
        let record = Arc::new(ClientRecord::new(
            self.next_id(),
            owner,
            verifier,
            random_verifier(),
            minor_version,
        ));
        self.clients.write().insert(record.id, record.clone());
        record
    }
}

impl Default for InMemoryClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn random_verifier() -> Verifier {
    let mut verifier = [0u8; 8];
    verifier.copy_from_slice(&Uuid::new_v4().as_bytes()[..8]);
    verifier
}

impl ClientRegistry for InMemoryClientRegistry {
    fn setclientid(&self, owner: Bytes, verifier: Verifier) -> Arc<ClientRecord> {
        // A confirmed record with the same verifier is the same client instance
        let existing = self
            .clients
            .read()
            .values()
            .find(|c| c.minor_version == 0 && c.owner == owner && c.verifier == verifier && c.is_confirmed())
            .cloned();
        existing.unwrap_or_else(|| self.insert(owner, verifier, 0))
    }

    fn confirm(&self, id: ClientId, confirm: &Verifier) -> Result<Arc<ClientRecord>, Nfsstat4> {
        let record = self.get(id).ok_or(Nfsstat4::StaleClientid)?;
        if record.confirm != *confirm {
            return Err(Nfsstat4::StaleClientid);
        }
        record.set_confirmed();

        // Earlier incarnations of this owner are superseded
        self.clients
            .write()
            .retain(|other_id, other| *other_id == id || other.owner != record.owner || other.minor_version != 0);
        Ok(record)
    }

    fn exchange_id(&self, owner: Bytes, verifier: Verifier) -> ExchangedClient {
        let mut clients = self.clients.write();
        let mut superseded = None;
        if let Some(existing) = clients
            .values()
            .find(|c| c.minor_version == 1 && c.owner == owner)
            .cloned()
        {
            if existing.verifier == verifier {
                return ExchangedClient {
                    record: existing,
                    superseded: None,
                };
            }
            // Client rebooted: drop the old incarnation
            clients.remove(&existing.id);
            superseded = Some(existing.id);
        }

        let record = Arc::new(ClientRecord::new(
            self.next_id(),
            owner,
            verifier,
            random_verifier(),
            1,
        ));
        clients.insert(record.id, record.clone());
        ExchangedClient { record, superseded }
    }

    fn get(&self, id: ClientId) -> Option<Arc<ClientRecord>> {
        self.clients.read().get(&id).cloned()
    }
}
