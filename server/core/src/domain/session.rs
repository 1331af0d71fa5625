// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! NFSv4.1 sessions and their replay caches
//!
//! A session owns a slot table. Each slot remembers the last sequence id it
//! accepted and holds a single-entry replay cache. Compounds of one session
//! may run on different workers at once, so each slot sits behind its own
//! mutex.

use crate::domain::client::{ClientId, ClientRecord};
use crate::domain::compound::CompoundResponse;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// `sessionid4`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub [u8; 16]);

impl SessionId {
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self)
    }
}

/// `channel_attrs4` (without RDMA attributes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAttrs {
    pub header_pad_size: u32,
    pub max_request_size: u32,
    pub max_response_size: u32,
    pub max_response_size_cached: u32,
    /// Per-compound operation ceiling
    pub max_operations: u32,
    /// Slot count
    pub max_requests: u32,
}

impl ChannelAttrs {
    /// Negotiate a client's proposal down to the server's limits
    pub fn negotiate(&self, requested: &ChannelAttrs) -> ChannelAttrs {
        ChannelAttrs {
            header_pad_size: 0,
            max_request_size: requested.max_request_size.min(self.max_request_size),
            max_response_size: requested.max_response_size.min(self.max_response_size),
            max_response_size_cached: requested
                .max_response_size_cached
                .min(self.max_response_size_cached),
            max_operations: requested.max_operations.clamp(1, self.max_operations),
            max_requests: requested.max_requests.clamp(1, self.max_requests),
        }
    }
}

/// Single-entry duplicate request cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReplayCache {
    #[default]
    Empty,
    Occupied(CompoundResponse),
}

impl ReplayCache {
    /// Store `response`, handing back whatever it replaced
    pub fn store(&mut self, response: CompoundResponse) -> Option<CompoundResponse> {
        match std::mem::replace(self, ReplayCache::Occupied(response)) {
            ReplayCache::Occupied(evicted) => Some(evicted),
            ReplayCache::Empty => None,
        }
    }

    pub fn evict(&mut self) -> Option<CompoundResponse> {
        match std::mem::take(self) {
            ReplayCache::Occupied(evicted) => Some(evicted),
            ReplayCache::Empty => None,
        }
    }

    pub fn cached(&self) -> Option<&CompoundResponse> {
        match self {
            ReplayCache::Occupied(response) => Some(response),
            ReplayCache::Empty => None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, ReplayCache::Occupied(_))
    }
}

#[derive(Debug, Default)]
pub struct Slot {
    pub sequence_id: u32,
    pub cache: ReplayCache,
    /// The compound that claimed `sequence_id` has not finished yet
    pub in_progress: bool,
}

impl Slot {
    /// Release the claim taken for `sequence_id`, caching `reply` if given.
    /// `false` when the slot is no longer held for that sequence id.
    pub fn complete(&mut self, sequence_id: u32, reply: Option<CompoundResponse>) -> bool {
        if !self.in_progress || self.sequence_id != sequence_id {
            return false;
        }
        self.in_progress = false;
        if let Some(reply) = reply {
            self.cache.store(reply);
        }
        true
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub client_id: ClientId,
    pub fore_attrs: ChannelAttrs,
    pub created_at: DateTime<Utc>,
    slots: Vec<Mutex<Slot>>,
}

impl Session {
    pub fn new(id: SessionId, client_id: ClientId, fore_attrs: ChannelAttrs) -> Self {
        let slots = (0..fore_attrs.max_requests.max(1))
            .map(|_| Mutex::new(Slot::default()))
            .collect();
        Self {
            id,
            client_id,
            fore_attrs,
            created_at: Utc::now(),
            slots,
        }
    }

    /// Negotiated per-compound operation ceiling
    pub fn max_operations(&self) -> u32 {
        self.fore_attrs.max_operations
    }

    pub fn highest_slot_id(&self) -> u32 {
        self.slots.len().saturating_sub(1) as u32
    }

    pub fn slot(&self, slot_id: u32) -> Option<MutexGuard<'_, Slot>> {
        self.slots.get(slot_id as usize).map(|slot| slot.lock())
    }
}

/// Where a compound's response is served from or stored into
#[derive(Debug, Clone)]
pub enum SlotRef {
    /// A slot in a session's slot table (SEQUENCE)
    Session { session: Arc<Session>, slot_id: u32 },
    /// A client's create-session slot (CREATE_SESSION outside a session)
    CreateSession(Arc<ClientRecord>),
}

impl SlotRef {
    /// Run `f` with the slot locked; `None` if the slot id is out of range
    pub fn with_slot<R>(&self, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        match self {
            SlotRef::Session { session, slot_id } => session.slot(*slot_id).map(|mut slot| f(&mut *slot)),
            SlotRef::CreateSession(client) => Some(f(&mut *client.create_session_slot())),
        }
    }
}

/// A slot claimed by a compound that is still executing
#[derive(Debug, Clone)]
pub struct InFlight {
    pub slot: SlotRef,
    pub sequence_id: u32,
}

impl InFlight {
    /// See [`Slot::complete`]
    pub fn complete(&self, reply: Option<CompoundResponse>) -> bool {
        self.slot
            .with_slot(|slot| slot.complete(self.sequence_id, reply))
            .unwrap_or(false)
    }
}

/// Session table
pub trait SessionRegistry: Send + Sync {
    fn create(&self, client_id: ClientId, fore_attrs: ChannelAttrs) -> Arc<Session>;

    fn lookup(&self, id: &SessionId) -> Option<Arc<Session>>;

    /// Remove a session; `false` if it was unknown
    fn destroy(&self, id: &SessionId) -> bool;

    /// Remove every session of `client_id`, returning how many there were
    fn destroy_client_sessions(&self, client_id: ClientId) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::Nfsstat4;
    use bytes::Bytes;

    fn attrs(max_operations: u32, max_requests: u32) -> ChannelAttrs {
        ChannelAttrs {
            header_pad_size: 0,
            max_request_size: 1 << 20,
            max_response_size: 1 << 20,
            max_response_size_cached: 1 << 16,
            max_operations,
            max_requests,
        }
    }

    #[test]
    fn test_replay_cache_store_returns_evicted() {
        let mut cache = ReplayCache::default();
        let first = CompoundResponse::new(Bytes::from_static(b"one"));
        let second = CompoundResponse {
            status: Nfsstat4::Noent,
            ..CompoundResponse::new(Bytes::from_static(b"two"))
        };

        assert!(cache.store(first.clone()).is_none());
        assert_eq!(cache.store(second.clone()), Some(first));
        assert_eq!(cache.cached(), Some(&second));
        assert_eq!(cache.evict(), Some(second));
        assert!(!cache.is_occupied());
    }

    #[test]
    fn test_negotiate_clamps_to_server_limits() {
        let server = attrs(16, 8);
        let agreed = server.negotiate(&attrs(64, 0));
        assert_eq!(agreed.max_operations, 16);
        assert_eq!(agreed.max_requests, 1);
        assert_eq!(server.negotiate(&attrs(4, 2)).max_operations, 4);
    }

    #[test]
    fn test_slot_table_sized_by_max_requests() {
        let session = Session::new(SessionId::generate(), ClientId(1), attrs(8, 3));
        assert_eq!(session.highest_slot_id(), 2);
        assert!(session.slot(2).is_some());
        assert!(session.slot(3).is_none());
    }

    #[test]
    fn test_slot_complete_only_for_claimed_sequence() {
        let mut slot = Slot {
            sequence_id: 4,
            in_progress: true,
            ..Default::default()
        };
        assert!(!slot.complete(3, Some(CompoundResponse::default())));
        assert!(slot.in_progress);

        assert!(slot.complete(4, Some(CompoundResponse::default())));
        assert!(!slot.in_progress);
        assert!(slot.cache.is_occupied());
        assert!(!slot.complete(4, None));
    }

    #[test]
    fn test_in_flight_releases_session_slot() {
        let session = Arc::new(Session::new(SessionId::generate(), ClientId(1), attrs(8, 2)));
        {
            let mut slot = session.slot(1).unwrap();
            slot.sequence_id = 1;
            slot.in_progress = true;
        }
        let in_flight = InFlight {
            slot: SlotRef::Session {
                session: session.clone(),
                slot_id: 1,
            },
            sequence_id: 1,
        };
        assert!(in_flight.complete(None));
        let slot = session.slot(1).unwrap();
        assert!(!slot.in_progress);
        assert!(!slot.cache.is_occupied());
    }

    #[test]
    fn test_slot_ref_out_of_range() {
        let session = Arc::new(Session::new(SessionId::generate(), ClientId(1), attrs(8, 1)));
        let slot = SlotRef::Session { session, slot_id: 5 };
        assert!(slot.with_slot(|s| s.sequence_id).is_none());
    }
}
