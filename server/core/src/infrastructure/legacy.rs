// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory mount list and network status monitor registry

use crate::domain::legacy::{LockStateError, MountList, MountListError, NsmClient, NsmRegistry};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct InMemoryMountList {
    entries: Mutex<Vec<(String, String)>>,
}

impl InMemoryMountList {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MountList for InMemoryMountList {
    fn add(&self, host: &str, path: &str) {
        self.entries.lock().push((host.to_string(), path.to_string()));
    }

    fn purge(&self) -> Result<(), MountListError> {
        self.entries.lock().clear();
        Ok(())
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }
}

/// Monitored host and the NSM state number of each lock it holds
pub struct InMemoryNsmClient {
    monitor_name: String,
    locks: Mutex<Vec<i32>>,
}

impl InMemoryNsmClient {
    pub fn new(monitor_name: impl Into<String>) -> Self {
        Self {
            monitor_name: monitor_name.into(),
            locks: Mutex::new(Vec::new()),
        }
    }

    /// Record a lock granted while the host reported `state`
    pub fn record_lock(&self, state: i32) {
        self.locks.lock().push(state);
    }

    pub fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }
}

impl NsmClient for InMemoryNsmClient {
    fn monitor_name(&self) -> &str {
        &self.monitor_name
    }

    fn notify_lock_state(&self, state: i32) -> Result<usize, LockStateError> {
        let mut locks = self.locks.lock();
        let before = locks.len();
        // Locks taken under the new state were granted after the reboot
        locks.retain(|&held| held == state);
        Ok(before - locks.len())
    }
}

#[derive(Default)]
pub struct InMemoryNsmRegistry {
    clients: RwLock<HashMap<String, Arc<InMemoryNsmClient>>>,
}

impl InMemoryNsmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start monitoring `monitor_name`, returning the existing client if any
    pub fn register(&self, monitor_name: &str) -> Arc<InMemoryNsmClient> {
        self.clients
            .write()
            .entry(monitor_name.to_string())
            .or_insert_with(|| Arc::new(InMemoryNsmClient::new(monitor_name)))
            .clone()
    }
}

impl NsmRegistry for InMemoryNsmRegistry {
    fn get(&self, monitor_name: &str) -> Option<Arc<dyn NsmClient>> {
        self.clients
            .read()
            .get(monitor_name)
            .map(|client| client.clone() as Arc<dyn NsmClient>)
    }
}
