// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Export table loaded once from configuration

use crate::domain::access::AccessType;
use crate::domain::credential::{ANON_GID, ANON_UID};
use crate::domain::export::{Export, ExportId, ExportTable};
use crate::domain::server_config::{ConfigError, ServerConfig};
use std::collections::HashMap;
use std::sync::Arc;

pub struct StaticExportTable {
    exports: HashMap<ExportId, Arc<Export>>,
}

impl StaticExportTable {
    /// Build a table from `exports`, adding the pseudo export if absent
    pub fn new(exports: impl IntoIterator<Item = Export>) -> Self {
        let mut exports: HashMap<ExportId, Arc<Export>> = exports
            .into_iter()
            .map(|export| (export.id, Arc::new(export)))
            .collect();
        exports
            .entry(ExportId::PSEUDO)
            .or_insert_with(|| Arc::new(pseudo_export()));
        Self { exports }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let exports = config
            .exports
            .iter()
            .map(|export| export.to_export())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(exports))
    }
}

/// Export 0: the read-only metadata namespace joining all exports
pub fn pseudo_export() -> Export {
    Export {
        id: ExportId::PSEUDO,
        path: "/".to_string(),
        pseudo_path: "/".to_string(),
        access: AccessType::MdonlyRo.flags(),
        clients: Vec::new(),
        data_server: false,
        anonymous_uid: ANON_UID,
        anonymous_gid: ANON_GID,
    }
}

impl ExportTable for StaticExportTable {
    fn get(&self, id: ExportId) -> Option<Arc<Export>> {
        self.exports.get(&id).cloned()
    }

    fn exports(&self) -> Vec<Arc<Export>> {
        let mut exports: Vec<_> = self.exports.values().cloned().collect();
        exports.sort_by_key(|export| export.id);
        exports
    }
}
