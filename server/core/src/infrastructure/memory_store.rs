// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory object store
//!
//! Objects live for the lifetime of the process. Every export has a root
//! directory; the pseudo filesystem is stored as export 0.

use crate::domain::compound::CreateKind;
use crate::domain::export::ExportId;
use crate::domain::object::{CacheEntry, Content, DsObject, ObjectId, ObjectKind, ObjectStore};
use crate::domain::status::Nfsstat4;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
const SYMLINK_MODE: u32 = 0o777;

type ObjectKey = (ExportId, ObjectId);

pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectKey, Arc<CacheEntry>>>,
    data_servers: RwLock<HashMap<ObjectKey, Arc<DsObject>>>,
    roots: RwLock<HashMap<ExportId, ObjectId>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            data_servers: RwLock::new(HashMap::new()),
            roots: RwLock::new(HashMap::new()),
            // fileid 0 is never handed out
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> ObjectId {
        ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Root directory of `export`, created on first use
    pub fn ensure_root(&self, export: ExportId) -> Arc<CacheEntry> {
        if let Ok(root) = self.root(export) {
            return root;
        }
        let mut roots = self.roots.write();
        if let Some(id) = roots.get(&export) {
            if let Some(root) = self.objects.read().get(&(export, *id)) {
                return root.clone();
            }
        }

        let id = self.allocate_id();
        let root = Arc::new(CacheEntry::new(
            export,
            id,
            None,
            Content::Directory(Default::default()),
            DIR_MODE,
        ));
        self.objects.write().insert((export, id), root.clone());
        roots.insert(export, id);
        debug!(export = export.0, object = id.0, "Created export root");
        root
    }

    /// Add `content` as `name` under `dir`
    pub fn insert(&self, dir: &CacheEntry, name: &str, content: Content, mode: u32) -> Result<Arc<CacheEntry>, Nfsstat4> {
        let id = self.allocate_id();
        dir.insert_child(name, id)?;
        let entry = Arc::new(CacheEntry::new(dir.export_id, id, Some(dir.id), content, mode));
        self.objects.write().insert((dir.export_id, id), entry.clone());
        Ok(entry)
    }

    /// Seed a regular file
    pub fn insert_file(&self, dir: &CacheEntry, name: &str, data: impl Into<Vec<u8>>) -> Result<Arc<CacheEntry>, Nfsstat4> {
        self.insert(dir, name, Content::File(data.into()), FILE_MODE)
    }

    pub fn insert_dir(&self, dir: &CacheEntry, name: &str) -> Result<Arc<CacheEntry>, Nfsstat4> {
        self.insert(dir, name, Content::Directory(Default::default()), DIR_MODE)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, export: ExportId, object: ObjectId) -> Result<Arc<CacheEntry>, Nfsstat4> {
        self.objects.read().get(&(export, object)).cloned().ok_or(Nfsstat4::Stale)
    }

    fn root(&self, export: ExportId) -> Result<Arc<CacheEntry>, Nfsstat4> {
        let id = *self.roots.read().get(&export).ok_or(Nfsstat4::Stale)?;
        self.get(export, id)
    }

    fn data_server(&self, export: ExportId, object: ObjectId) -> Result<Arc<DsObject>, Nfsstat4> {
        if let Some(ds) = self.data_servers.read().get(&(export, object)) {
            return Ok(ds.clone());
        }

        let backing = self.get(export, object)?;
        match backing.kind() {
            ObjectKind::Regular => {}
            ObjectKind::Directory => return Err(Nfsstat4::Isdir),
            ObjectKind::Symlink => return Err(Nfsstat4::Inval),
        }

        let ds = self
            .data_servers
            .write()
            .entry((export, object))
            .or_insert_with(|| Arc::new(DsObject::new(backing)))
            .clone();
        Ok(ds)
    }

    fn create(
        &self,
        dir: &CacheEntry,
        name: &str,
        kind: &CreateKind,
        owner: (u32, u32),
    ) -> Result<Arc<CacheEntry>, Nfsstat4> {
        let entry = match kind {
            CreateKind::Directory => self.insert_dir(dir, name)?,
            CreateKind::Symlink { target } => self.insert(dir, name, Content::Symlink(target.clone()), SYMLINK_MODE)?,
        };
        entry.set_owner(owner.0, owner.1);
        debug!(export = dir.export_id.0, object = entry.id.0, name, "Created object");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_stable() {
        let store = MemoryStore::new();
        let a = store.ensure_root(ExportId(1));
        let b = store.ensure_root(ExportId(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&store.root(ExportId(1)).unwrap(), &a));
        assert_eq!(store.root(ExportId(2)).unwrap_err(), Nfsstat4::Stale);
    }

    #[test]
    fn test_create_and_lookup() {
        let store = MemoryStore::new();
        let root = store.ensure_root(ExportId(1));
        let dir = store.create(&root, "docs", &CreateKind::Directory, (1000, 100)).unwrap();
        assert_eq!(dir.attrs().uid, 1000);

        let found = store.lookup(&root, "docs").unwrap();
        assert!(Arc::ptr_eq(&found, &dir));
        assert!(Arc::ptr_eq(&store.parent(&dir).unwrap(), &root));

        let err = store.create(&root, "docs", &CreateKind::Directory, (0, 0)).unwrap_err();
        assert_eq!(err, Nfsstat4::Exist);
    }

    #[test]
    fn test_data_server_objects_are_shared() {
        let store = MemoryStore::new();
        let root = store.ensure_root(ExportId(1));
        let file = store.insert_file(&root, "blob", b"data".to_vec()).unwrap();

        let a = store.data_server(ExportId(1), file.id).unwrap();
        let b = store.data_server(ExportId(1), file.id).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.data_server(ExportId(1), root.id).unwrap_err(), Nfsstat4::Isdir);
    }
}
