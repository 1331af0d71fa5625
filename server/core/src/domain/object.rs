// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backing objects referenced by a compound
//!
//! A compound's current and saved positions each hold at most one backing
//! reference: a cache entry (an inode-like object owned by the object store)
//! or a pNFS data-server object. [`ObjectRef`] makes "both at once"
//! unrepresentable. References are `Arc`s; dropping one releases it.

use crate::domain::compound::CreateKind;
use crate::domain::export::ExportId;
use crate::domain::status::Nfsstat4;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Object identifier, unique within one export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// NFSv4 object type (`nfs_ftype4` subset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Regular,
    Directory,
    Symlink,
}

/// Attributes returned by GETATTR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttrs {
    pub kind: ObjectKind,
    pub size: u64,
    pub fileid: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub change: u64,
}

#[derive(Debug)]
pub enum Content {
    File(Vec<u8>),
    Directory(BTreeMap<String, ObjectId>),
    Symlink(String),
    /// Pseudo-filesystem node that mounts another export's root
    Junction(ExportId),
}

fn kind_of(content: &Content) -> ObjectKind {
    match content {
        Content::File(_) => ObjectKind::Regular,
        Content::Directory(_) | Content::Junction(_) => ObjectKind::Directory,
        Content::Symlink(_) => ObjectKind::Symlink,
    }
}

#[derive(Debug)]
struct EntryState {
    content: Content,
    mode: u32,
    uid: u32,
    gid: u32,
    change: u64,
}

/// Inode-like object cached by the object store
#[derive(Debug)]
pub struct CacheEntry {
    pub export_id: ExportId,
    pub id: ObjectId,
    pub parent: Option<ObjectId>,
    state: RwLock<EntryState>,
}

impl CacheEntry {
    pub fn new(export_id: ExportId, id: ObjectId, parent: Option<ObjectId>, content: Content, mode: u32) -> Self {
        Self {
            export_id,
            id,
            parent,
            state: RwLock::new(EntryState {
                content,
                mode,
                uid: 0,
                gid: 0,
                change: 1,
            }),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        kind_of(&self.state.read().content)
    }

    pub fn attrs(&self) -> ObjectAttrs {
        let state = self.state.read();
        let size = match &state.content {
            Content::File(data) => data.len() as u64,
            Content::Directory(children) => 4096u64.max(children.len() as u64 * 64),
            Content::Symlink(target) => target.len() as u64,
            Content::Junction(_) => 4096,
        };
        ObjectAttrs {
            kind: kind_of(&state.content),
            size,
            fileid: self.id.0,
            mode: state.mode,
            uid: state.uid,
            gid: state.gid,
            change: state.change,
        }
    }

    /// Export mounted at this node, if it is a pseudo-filesystem junction
    pub fn junction(&self) -> Option<ExportId> {
        match self.state.read().content {
            Content::Junction(export) => Some(export),
            _ => None,
        }
    }

    /// Resolve a child name in a directory
    pub fn child(&self, name: &str) -> Result<ObjectId, Nfsstat4> {
        match &self.state.read().content {
            Content::Directory(children) => children.get(name).copied().ok_or(Nfsstat4::Noent),
            Content::Junction(_) => Err(Nfsstat4::Noent),
            Content::Symlink(_) => Err(Nfsstat4::Symlink),
            Content::File(_) => Err(Nfsstat4::Notdir),
        }
    }

    pub fn readlink(&self) -> Result<String, Nfsstat4> {
        match &self.state.read().content {
            Content::Symlink(target) => Ok(target.clone()),
            _ => Err(Nfsstat4::Inval),
        }
    }

    pub fn insert_child(&self, name: &str, id: ObjectId) -> Result<(), Nfsstat4> {
        let mut state = self.state.write();
        match &mut state.content {
            Content::Directory(children) => {
                if children.contains_key(name) {
                    return Err(Nfsstat4::Exist);
                }
                children.insert(name.to_string(), id);
            }
            _ => return Err(Nfsstat4::Notdir),
        }
        state.change += 1;
        Ok(())
    }

    pub fn read(&self, offset: u64, count: u32) -> Result<(Bytes, bool), Nfsstat4> {
        let state = self.state.read();
        let data = match &state.content {
            Content::File(data) => data,
            Content::Directory(_) | Content::Junction(_) => return Err(Nfsstat4::Isdir),
            Content::Symlink(_) => return Err(Nfsstat4::Inval),
        };
        let start = usize::try_from(offset).map_err(|_| Nfsstat4::Inval)?.min(data.len());
        let end = start.saturating_add(count as usize).min(data.len());
        Ok((Bytes::copy_from_slice(&data[start..end]), end == data.len()))
    }

    pub fn write(&self, offset: u64, bytes: &[u8]) -> Result<u32, Nfsstat4> {
        let mut state = self.state.write();
        let data = match &mut state.content {
            Content::File(data) => data,
            Content::Directory(_) | Content::Junction(_) => return Err(Nfsstat4::Isdir),
            Content::Symlink(_) => return Err(Nfsstat4::Inval),
        };
        let start = usize::try_from(offset).map_err(|_| Nfsstat4::Fbig)?;
        let end = start.checked_add(bytes.len()).ok_or(Nfsstat4::Fbig)?;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        state.change += 1;
        u32::try_from(bytes.len()).map_err(|_| Nfsstat4::Inval)
    }

    pub fn set_owner(&self, uid: u32, gid: u32) {
        let mut state = self.state.write();
        state.uid = uid;
        state.gid = gid;
    }
}

/// Object served through the pNFS data-server path
#[derive(Debug)]
pub struct DsObject {
    backing: Arc<CacheEntry>,
}

impl DsObject {
    pub fn new(backing: Arc<CacheEntry>) -> Self {
        Self { backing }
    }

    pub fn export_id(&self) -> ExportId {
        self.backing.export_id
    }

    pub fn id(&self) -> ObjectId {
        self.backing.id
    }

    /// Metadata object behind the data-server object
    pub fn entry(&self) -> &Arc<CacheEntry> {
        &self.backing
    }

    pub fn read(&self, offset: u64, count: u32) -> Result<(Bytes, bool), Nfsstat4> {
        self.backing.read(offset, count)
    }

    pub fn write(&self, offset: u64, bytes: &[u8]) -> Result<u32, Nfsstat4> {
        self.backing.write(offset, bytes)
    }
}

/// Backing reference held by one context position (current or saved)
#[derive(Debug, Clone, Default)]
pub enum ObjectRef {
    #[default]
    None,
    Cache(Arc<CacheEntry>),
    DataServer(Arc<DsObject>),
}

impl ObjectRef {
    pub fn is_none(&self) -> bool {
        matches!(self, ObjectRef::None)
    }

    pub fn cache_entry(&self) -> Option<&Arc<CacheEntry>> {
        match self {
            ObjectRef::Cache(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn data_server(&self) -> Option<&Arc<DsObject>> {
        match self {
            ObjectRef::DataServer(ds) => Some(ds),
            _ => None,
        }
    }

    /// Metadata entry for either kind of reference
    pub fn entry(&self) -> Option<&Arc<CacheEntry>> {
        match self {
            ObjectRef::None => None,
            ObjectRef::Cache(entry) => Some(entry),
            ObjectRef::DataServer(ds) => Some(ds.entry()),
        }
    }

    /// Take the reference, leaving `None` behind
    pub fn take(&mut self) -> ObjectRef {
        std::mem::take(self)
    }
}

/// Storage / cache-inode layer consulted by handlers
pub trait ObjectStore: Send + Sync {
    fn get(&self, export: ExportId, object: ObjectId) -> Result<Arc<CacheEntry>, Nfsstat4>;

    fn root(&self, export: ExportId) -> Result<Arc<CacheEntry>, Nfsstat4>;

    fn lookup(&self, dir: &CacheEntry, name: &str) -> Result<Arc<CacheEntry>, Nfsstat4> {
        let child = dir.child(name)?;
        self.get(dir.export_id, child)
    }

    fn parent(&self, entry: &CacheEntry) -> Result<Arc<CacheEntry>, Nfsstat4> {
        let parent = entry.parent.ok_or(Nfsstat4::Noent)?;
        self.get(entry.export_id, parent)
    }

    fn data_server(&self, export: ExportId, object: ObjectId) -> Result<Arc<DsObject>, Nfsstat4>;

    /// Create a directory or symlink `name` in `dir`, owned by `owner` (uid, gid)
    fn create(
        &self,
        dir: &CacheEntry,
        name: &str,
        kind: &CreateKind,
        owner: (u32, u32),
    ) -> Result<Arc<CacheEntry>, Nfsstat4>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(data: &[u8]) -> CacheEntry {
        CacheEntry::new(ExportId(1), ObjectId(2), Some(ObjectId(1)), Content::File(data.to_vec()), 0o644)
    }

    #[test]
    fn test_read_reports_eof() {
        let entry = file(b"hello world");
        let (data, eof) = entry.read(0, 5).unwrap();
        assert_eq!(&data[..], b"hello");
        assert!(!eof);
        let (data, eof) = entry.read(6, 100).unwrap();
        assert_eq!(&data[..], b"world");
        assert!(eof);
    }

    #[test]
    fn test_write_extends_and_bumps_change() {
        let entry = file(b"ab");
        let before = entry.attrs().change;
        assert_eq!(entry.write(4, b"xy").unwrap(), 2);
        assert_eq!(entry.attrs().size, 6);
        assert!(entry.attrs().change > before);
        assert_eq!(&entry.read(0, 6).unwrap().0[..], b"ab\0\0xy");
    }

    #[test]
    fn test_directory_rejects_io() {
        let dir = CacheEntry::new(ExportId(1), ObjectId(1), None, Content::Directory(BTreeMap::new()), 0o755);
        assert_eq!(dir.read(0, 1).unwrap_err(), Nfsstat4::Isdir);
        assert_eq!(file(b"").child("x").unwrap_err(), Nfsstat4::Notdir);
        dir.insert_child("x", ObjectId(5)).unwrap();
        assert_eq!(dir.insert_child("x", ObjectId(6)).unwrap_err(), Nfsstat4::Exist);
        assert_eq!(dir.child("x").unwrap(), ObjectId(5));
    }

    #[test]
    fn test_object_ref_take_leaves_none() {
        let mut slot = ObjectRef::Cache(Arc::new(file(b"")));
        let taken = slot.take();
        assert!(slot.is_none());
        assert!(taken.cache_entry().is_some());
    }
}
