// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! ONC-RPC record marking and call/reply envelopes
//!
//! Each record is a sequence of fragments. A fragment starts with a 4-byte
//! big-endian header: the high bit marks the last fragment, the low 31 bits
//! give the fragment length. Record payloads carry `bincode`-encoded
//! envelopes.

use crate::domain::compound::CompoundResponse;
use crate::domain::credential::OpaqueAuth;
use bytes::{Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest record accepted from a peer
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

const LAST_FRAGMENT: u32 = 0x8000_0000;
const FRAGMENT_LEN_MASK: u32 = 0x7fff_ffff;

pub const NFS_PROGRAM: u32 = 100_003;
pub const NFS_V4: u32 = 4;
pub const NFSPROC4_NULL: u32 = 0;
pub const NFSPROC4_COMPOUND: u32 = 1;

pub const MOUNT_PROGRAM: u32 = 100_005;
pub const MOUNT_V3: u32 = 3;
pub const MOUNTPROC3_UMNTALL: u32 = 4;

pub const NLM_PROGRAM: u32 = 100_021;
pub const NLM_V4: u32 = 4;
pub const NLMPROC4_SM_NOTIFY: u32 = 16;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLarge { size: usize, max: usize },

    #[error("Connection closed in the middle of a record")]
    TruncatedRecord,

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),
}

/// Read one complete record. `Ok(None)` is a clean end of stream.
pub async fn read_record<R>(reader: &mut R) -> Result<Option<Bytes>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut record = BytesMut::new();
    loop {
        let header = match reader.read_u32().await {
            Ok(header) => header,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return if record.is_empty() {
                    Ok(None)
                } else {
                    Err(TransportError::TruncatedRecord)
                };
            }
            Err(e) => return Err(e.into()),
        };

        let len = (header & FRAGMENT_LEN_MASK) as usize;
        let size = record.len() + len;
        if size > MAX_RECORD_SIZE {
            return Err(TransportError::RecordTooLarge {
                size,
                max: MAX_RECORD_SIZE,
            });
        }

        let start = record.len();
        record.resize(size, 0);
        reader.read_exact(&mut record[start..]).await.map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => TransportError::TruncatedRecord,
            _ => TransportError::Io(e),
        })?;

        if header & LAST_FRAGMENT != 0 {
            return Ok(Some(record.freeze()));
        }
    }
}

/// Write `payload` as a single-fragment record
pub async fn write_record<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_RECORD_SIZE {
        return Err(TransportError::RecordTooLarge {
            size: payload.len(),
            max: MAX_RECORD_SIZE,
        });
    }
    writer.write_u32(LAST_FRAGMENT | payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// An incoming call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub xid: u32,
    pub program: u32,
    pub version: u32,
    pub procedure: u32,
    pub auth: OpaqueAuth,
    /// Procedure arguments, encoded separately so a bad body can be told
    /// apart from a bad envelope
    pub args: Bytes,
}

/// NLM `SM_NOTIFY` arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmNotifyArgs {
    pub name: String,
    pub state: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyBody {
    Void,
    Compound(CompoundResponse),
    ProgUnavail,
    ProcUnavail,
    GarbageArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub xid: u32,
    pub body: ReplyBody,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TransportError> {
    bincode::serialize(value).map_err(|e| TransportError::Encode(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
    bincode::deserialize(bytes).map_err(|e| TransportError::Decode(e.to_string()))
}
