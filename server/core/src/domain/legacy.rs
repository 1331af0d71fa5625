// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Collaborators of the single-call side protocols (MOUNT and NLM)

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MountListError {
    #[error("Mount list is unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum LockStateError {
    #[error("Lock state for {0} is busy")]
    Busy(String),
}

/// MOUNT protocol bookkeeping of which clients mounted what
pub trait MountList: Send + Sync {
    fn add(&self, host: &str, path: &str);

    /// Forget every recorded mount
    fn purge(&self) -> Result<(), MountListError>;

    fn entries(&self) -> Vec<(String, String)>;
}

/// Client known to the network status monitor
pub trait NsmClient: Send + Sync {
    fn monitor_name(&self) -> &str;

    /// Release lock state recorded under a state number other than `state`,
    /// returning how many locks were dropped
    fn notify_lock_state(&self, state: i32) -> Result<usize, LockStateError>;
}

pub trait NsmRegistry: Send + Sync {
    /// Find an already-registered client; never creates one
    fn get(&self, monitor_name: &str) -> Option<Arc<dyn NsmClient>>;
}
