// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Legacy Single-Call Protocols
//!
//! MOUNT v3 `UMNTALL` and NLM v4 `SM_NOTIFY`. Both take one call, return a
//! void result and never fail at the protocol level.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Side protocols that share the NFS listener

use crate::domain::legacy::{MountList, NsmRegistry};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct LegacyService {
    mounts: Arc<dyn MountList>,
    nsm: Arc<dyn NsmRegistry>,
}

impl LegacyService {
    pub fn new(mounts: Arc<dyn MountList>, nsm: Arc<dyn NsmRegistry>) -> Self {
        Self { mounts, nsm }
    }

    pub fn mounts(&self) -> &Arc<dyn MountList> {
        &self.mounts
    }

    /// MOUNTPROC3_UMNTALL: forget every recorded mount
    pub fn umount_all(&self) {
        debug!("MOUNT UMNTALL received");
        if let Err(e) = self.mounts.purge() {
            error!("UMOUNT ALL: Error when emptying the mount list: {}", e);
        }
    }

    /// NLMPROC4_SM_NOTIFY: `name` rebooted and now reports `state`
    pub fn sm_notify(&self, name: &str, state: i32) {
        debug!("NLM SM_NOTIFY received for {}", name);

        // Only clients we already monitor have lock state to release
        if let Some(client) = self.nsm.get(name) {
            match client.notify_lock_state(state) {
                Ok(released) => debug!(monitor_name = name, released, "Released stale lock state"),
                Err(e) => warn!(monitor_name = name, "SM_NOTIFY could not release lock state: {}", e),
            }
            drop(client);
        }
    }
}
