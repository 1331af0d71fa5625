// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pseudo filesystem built from the export list
//!
//! Each export's `pseudo_path` becomes a chain of read-only directories in
//! export 0 ending in a junction node. LOOKUP of a junction lands on the
//! export's root.

use super::memory_store::MemoryStore;
use crate::domain::export::{Export, ExportId};
use crate::domain::file_handle::{FileHandle, FileHandleError, HandleBody};
use crate::domain::object::{CacheEntry, Content, ObjectId, ObjectStore};
use crate::domain::pseudo_fs::PseudoFs;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PseudoFsError {
    #[error("Export {0} cannot be mounted at the pseudo root")]
    RootPath(u16),

    #[error("Pseudo path {path} of export {export_id} conflicts with another export")]
    Conflict { export_id: u16, path: String },

    #[error("Failed to mint the pseudo root handle: {0}")]
    Handle(#[from] FileHandleError),
}

pub struct PseudoFsTree {
    root_fh: FileHandle,
    junctions: HashMap<ExportId, ObjectId>,
}

impl PseudoFsTree {
    /// Lay out every export under the pseudo root and create export roots
    pub fn build(store: &MemoryStore, exports: &[Arc<Export>]) -> Result<Self, PseudoFsError> {
        let root = store.ensure_root(ExportId::PSEUDO);
        let root_fh = FileHandle::encode(&HandleBody::new(ExportId::PSEUDO, root.id))?;
        let mut junctions = HashMap::new();

        for export in exports.iter().filter(|e| e.id != ExportId::PSEUDO) {
            let conflict = || PseudoFsError::Conflict {
                export_id: export.id.0,
                path: export.pseudo_path.clone(),
            };

            let components: Vec<&str> = export.pseudo_path.split('/').filter(|c| !c.is_empty()).collect();
            let Some((leaf, parents)) = components.split_last() else {
                return Err(PseudoFsError::RootPath(export.id.0));
            };

            let mut dir: Arc<CacheEntry> = root.clone();
            for name in parents {
                dir = match store.lookup(&dir, name) {
                    Ok(existing) if existing.junction().is_none() => existing,
                    Ok(_) => return Err(conflict()),
                    Err(_) => store.insert_dir(&dir, name).map_err(|_| conflict())?,
                };
            }

            let junction = store
                .insert(&dir, leaf, Content::Junction(export.id), 0o555)
                .map_err(|_| conflict())?;
            store.ensure_root(export.id);
            junctions.insert(export.id, junction.id);
            debug!(export = export.id.0, path = %export.pseudo_path, "Pseudo junction created");
        }

        info!("Pseudo filesystem built with {} exports", junctions.len());
        Ok(Self { root_fh, junctions })
    }
}

impl PseudoFs for PseudoFsTree {
    fn root_handle(&self) -> FileHandle {
        self.root_fh.clone()
    }

    fn junction_for(&self, export: ExportId) -> Option<ObjectId> {
        self.junctions.get(&export).copied()
    }
}
