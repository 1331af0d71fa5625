// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Client records and leases
//!
//! A lease stays valid while any compound holds a reservation on it. When the
//! last reservation is dropped the renewal time is stamped, and the lease
//! expires once a full lease period passes without further activity.

use crate::domain::session::Slot;
use crate::domain::status::Nfsstat4;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `clientid4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// `verifier4`
pub type Verifier = [u8; 8];

#[derive(Debug)]
pub struct Lease {
    reservations: u32,
    last_renew: Instant,
}

impl Lease {
    pub fn new() -> Self {
        Self {
            reservations: 0,
            last_renew: Instant::now(),
        }
    }

    /// Hold the lease open for the rest of a compound
    pub fn reserve(&mut self) {
        self.reservations += 1;
    }

    /// Drop one reservation; the last one out stamps the renewal time
    pub fn renew(&mut self) {
        self.reservations = self.reservations.saturating_sub(1);
        if self.reservations == 0 {
            self.last_renew = Instant::now();
        }
    }

    pub fn reservations(&self) -> u32 {
        self.reservations
    }

    pub fn is_valid(&self, lifetime: Duration) -> bool {
        self.reservations > 0 || self.last_renew.elapsed() < lifetime
    }
}

impl Default for Lease {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ClientRecord {
    pub id: ClientId,
    /// Client-supplied owner string (`nfs_client_id4.id` / `client_owner4`)
    pub owner: Bytes,
    pub verifier: Verifier,
    /// Confirmation verifier handed out by SETCLIENTID
    pub confirm: Verifier,
    pub minor_version: u32,
    pub created_at: DateTime<Utc>,
    confirmed: AtomicBool,
    reclaim_complete: AtomicBool,
    lease: Mutex<Lease>,
    create_session: Mutex<Slot>,
}

impl ClientRecord {
    pub fn new(id: ClientId, owner: Bytes, verifier: Verifier, confirm: Verifier, minor_version: u32) -> Self {
        Self {
            id,
            owner,
            verifier,
            confirm,
            minor_version,
            created_at: Utc::now(),
            confirmed: AtomicBool::new(false),
            reclaim_complete: AtomicBool::new(false),
            lease: Mutex::new(Lease::new()),
            create_session: Mutex::new(Slot::default()),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::Acquire)
    }

    pub fn set_confirmed(&self) {
        self.confirmed.store(true, Ordering::Release);
    }

    /// Record RECLAIM_COMPLETE; `false` if it was already recorded
    pub fn complete_reclaim(&self) -> bool {
        !self.reclaim_complete.swap(true, Ordering::AcqRel)
    }

    /// Lock the lease
    pub fn lease(&self) -> MutexGuard<'_, Lease> {
        self.lease.lock()
    }

    /// Lock the slot that caches this client's CREATE_SESSION replies
    pub fn create_session_slot(&self) -> MutexGuard<'_, Slot> {
        self.create_session.lock()
    }
}

/// Result of EXCHANGE_ID
#[derive(Debug, Clone)]
pub struct ExchangedClient {
    pub record: Arc<ClientRecord>,
    /// Earlier incarnation of the same owner removed by this exchange
    pub superseded: Option<ClientId>,
}

/// Client-id and lease registry
pub trait ClientRegistry: Send + Sync {
    /// NFSv4.0 SETCLIENTID: record an unconfirmed client for `owner`
    fn setclientid(&self, owner: Bytes, verifier: Verifier) -> Arc<ClientRecord>;

    /// NFSv4.0 SETCLIENTID_CONFIRM
    fn confirm(&self, id: ClientId, confirm: &Verifier) -> Result<Arc<ClientRecord>, Nfsstat4>;

    /// NFSv4.1 EXCHANGE_ID: find or create the record for `owner`. A new
    /// verifier replaces the previous record, whose id is reported back.
    fn exchange_id(&self, owner: Bytes, verifier: Verifier) -> ExchangedClient;

    fn get(&self, id: ClientId) -> Option<Arc<ClientRecord>>;
}
