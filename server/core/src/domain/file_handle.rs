// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! NFSv4 file handles
//!
//! On the wire a file handle is an opaque byte string of at most
//! [`NFS4_FHSIZE`] bytes. Handles minted by this server carry a
//! [`HandleBody`] serialized with bincode; anything else a client presents is
//! reported as `NFS4ERR_BADHANDLE`.

use crate::domain::export::ExportId;
use crate::domain::object::ObjectId;
use crate::domain::status::Nfsstat4;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest handle the protocol allows
pub const NFS4_FHSIZE: usize = 128;

/// Layout version stamped into every handle this server mints
pub const HANDLE_VERSION: u8 = 1;

/// Handle flag: the object lives on a pNFS data server
pub const FH_FLAG_DATA_SERVER: u8 = 0x01;

/// File handle encoding errors
#[derive(Debug, Error)]
pub enum FileHandleError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("FileHandle too large: {size} bytes (max {NFS4_FHSIZE})")]
    TooLarge { size: usize },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Unsupported handle version {found}")]
    Version { found: u8 },
}

/// Decoded contents of a server-minted handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleBody {
    pub version: u8,
    pub export_id: ExportId,
    pub object_id: ObjectId,
    pub flags: u8,
}

impl HandleBody {
    pub fn new(export_id: ExportId, object_id: ObjectId) -> Self {
        Self {
            version: HANDLE_VERSION,
            export_id,
            object_id,
            flags: 0,
        }
    }

    pub fn data_server(export_id: ExportId, object_id: ObjectId) -> Self {
        Self {
            flags: FH_FLAG_DATA_SERVER,
            ..Self::new(export_id, object_id)
        }
    }

    pub fn is_data_server(&self) -> bool {
        self.flags & FH_FLAG_DATA_SERVER != 0
    }
}

/// Opaque NFSv4 file handle. The default value is the empty (invalid) handle.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle(Bytes);

impl FileHandle {
    /// The distinguished empty handle
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Wrap raw bytes received from a client
    pub fn from_wire(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Mint a handle for `body`
    pub fn encode(body: &HandleBody) -> Result<Self, FileHandleError> {
        let bytes =
            bincode::serialize(body).map_err(|e| FileHandleError::Serialization(e.to_string()))?;

        if bytes.len() > NFS4_FHSIZE {
            return Err(FileHandleError::TooLarge { size: bytes.len() });
        }

        Ok(Self(Bytes::from(bytes)))
    }

    /// Decode a server-minted handle
    pub fn decode(&self) -> Result<HandleBody, FileHandleError> {
        if self.0.len() > NFS4_FHSIZE {
            return Err(FileHandleError::TooLarge { size: self.0.len() });
        }
        let body: HandleBody = bincode::deserialize(&self.0)
            .map_err(|e| FileHandleError::Deserialization(e.to_string()))?;
        if body.version != HANDLE_VERSION {
            return Err(FileHandleError::Version { found: body.version });
        }
        Ok(body)
    }

    /// Validate the handle the way the engine's permission gate needs it
    pub fn check(&self) -> Nfsstat4 {
        if self.0.is_empty() {
            return Nfsstat4::Nofilehandle;
        }
        match self.decode() {
            Ok(_) => Nfsstat4::Ok,
            Err(_) => Nfsstat4::Badhandle,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Copy into a freshly allocated buffer that shares nothing with `self`
    pub fn deep_copy(&self) -> Self {
        Self(Bytes::copy_from_slice(&self.0))
    }

    /// Forget the handle, leaving the empty state behind
    pub fn clear(&mut self) {
        self.0 = Bytes::new();
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("FileHandle(<empty>)");
        }
        write!(f, "FileHandle(")?;
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}
