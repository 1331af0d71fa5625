// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Caller credentials
//!
//! A credential is derived once per request from the RPC auth field and is
//! immutable for the rest of the compound. A request whose auth cannot be
//! decoded is dropped without a reply.

use bytes::{Buf, Bytes};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

pub const AUTH_NONE: u32 = 0;
pub const AUTH_SYS: u32 = 1;
pub const RPCSEC_GSS: u32 = 6;

/// Anonymous ids used for AUTH_NONE and unmapped GSS principals
pub const ANON_UID: u32 = 65534;
pub const ANON_GID: u32 = 65534;

/// AUTH_SYS limits (RFC 5531)
const MAX_MACHINE_NAME: usize = 255;
const MAX_AUX_GIDS: usize = 16;

const RPCSEC_GSS_VERSION: u32 = 1;
const MAX_GSS_HANDLE: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Unsupported auth flavor {0}")]
    UnsupportedFlavor(u32),

    #[error("Truncated credential body")]
    Truncated,

    #[error("Credential field too long: {field} ({len} bytes)")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Too many auxiliary gids: {0}")]
    TooManyGids(usize),

    #[error("Unsupported RPCSEC_GSS version {0}")]
    GssVersion(u32),

    #[error("Machine name is not valid UTF-8")]
    MachineName,
}

/// RPC `opaque_auth`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueAuth {
    pub flavor: u32,
    pub body: Bytes,
}

impl OpaqueAuth {
    pub fn none() -> Self {
        Self {
            flavor: AUTH_NONE,
            body: Bytes::new(),
        }
    }

    /// Build an AUTH_SYS body
    pub fn sys(machine_name: &str, uid: u32, gid: u32, gids: &[u32]) -> Self {
        let mut body = Vec::with_capacity(20 + machine_name.len() + 4 * gids.len());
        body.extend_from_slice(&0u32.to_be_bytes());
        put_opaque(&mut body, machine_name.as_bytes());
        body.extend_from_slice(&uid.to_be_bytes());
        body.extend_from_slice(&gid.to_be_bytes());
        body.extend_from_slice(&(gids.len() as u32).to_be_bytes());
        for g in gids {
            body.extend_from_slice(&g.to_be_bytes());
        }
        Self {
            flavor: AUTH_SYS,
            body: Bytes::from(body),
        }
    }
}

/// Transport-level view of an incoming call, as far as the engine needs it
#[derive(Debug, Clone, Default)]
pub struct RpcRequest {
    pub xid: u32,
    pub auth: OpaqueAuth,
    pub client_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlavor {
    None,
    Sys,
    Gss,
}

/// Caller identity for the lifetime of one compound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub flavor: AuthFlavor,
    pub uid: u32,
    pub gid: u32,
    pub gids: Vec<u32>,
    pub machine_name: Option<String>,
    pub client_addr: Option<IpAddr>,
}

impl Credential {
    pub fn anonymous(client_addr: Option<IpAddr>) -> Self {
        Self {
            flavor: AuthFlavor::None,
            uid: ANON_UID,
            gid: ANON_GID,
            gids: Vec::new(),
            machine_name: None,
            client_addr,
        }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

/// Build the caller's credential from the RPC auth field
pub fn resolve_credential(request: &RpcRequest) -> Result<Credential, CredentialError> {
    let client_addr = request.client_addr.map(|a| a.ip());
    let mut body = request.auth.body.clone();

    match request.auth.flavor {
        AUTH_NONE => Ok(Credential::anonymous(client_addr)),
        AUTH_SYS => {
            let _stamp = get_u32(&mut body)?;
            let machine = get_opaque(&mut body, "machinename", MAX_MACHINE_NAME)?;
            let machine_name =
                String::from_utf8(machine.to_vec()).map_err(|_| CredentialError::MachineName)?;
            let uid = get_u32(&mut body)?;
            let gid = get_u32(&mut body)?;
            let count = get_u32(&mut body)? as usize;
            if count > MAX_AUX_GIDS {
                return Err(CredentialError::TooManyGids(count));
            }
            let gids = (0..count)
                .map(|_| get_u32(&mut body))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Credential {
                flavor: AuthFlavor::Sys,
                uid,
                gid,
                gids,
                machine_name: Some(machine_name),
                client_addr,
            })
        }
        RPCSEC_GSS => {
            let version = get_u32(&mut body)?;
            if version != RPCSEC_GSS_VERSION {
                return Err(CredentialError::GssVersion(version));
            }
            let _gss_proc = get_u32(&mut body)?;
            let _seq_num = get_u32(&mut body)?;
            let _service = get_u32(&mut body)?;
            let _handle = get_opaque(&mut body, "handle", MAX_GSS_HANDLE)?;
            // Principal mapping needs the security context; treat as anonymous.
            Ok(Credential {
                flavor: AuthFlavor::Gss,
                ..Credential::anonymous(client_addr)
            })
        }
        other => Err(CredentialError::UnsupportedFlavor(other)),
    }
}

fn get_u32(buf: &mut Bytes) -> Result<u32, CredentialError> {
    if buf.remaining() < 4 {
        return Err(CredentialError::Truncated);
    }
    Ok(buf.get_u32())
}

fn get_opaque(buf: &mut Bytes, field: &'static str, max: usize) -> Result<Bytes, CredentialError> {
    let len = get_u32(buf)? as usize;
    if len > max {
        return Err(CredentialError::FieldTooLong { field, len });
    }
    let padded = (len + 3) & !3;
    if buf.remaining() < padded {
        return Err(CredentialError::Truncated);
    }
    let value = buf.split_to(len);
    buf.advance(padded - len);
    Ok(value)
}

fn put_opaque(out: &mut Vec<u8>, value: &[u8]) {
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
    out.resize(out.len() + ((4 - value.len() % 4) % 4), 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(auth: OpaqueAuth) -> RpcRequest {
        RpcRequest {
            xid: 1,
            auth,
            client_addr: Some("10.0.0.5:700".parse().unwrap()),
        }
    }

    #[test]
    fn test_auth_none_is_anonymous() {
        let cred = resolve_credential(&request(OpaqueAuth::none())).unwrap();
        assert_eq!(cred.flavor, AuthFlavor::None);
        assert_eq!(cred.uid, ANON_UID);
        assert_eq!(cred.client_addr, Some("10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn test_auth_sys_decodes_ids() {
        let cred = resolve_credential(&request(OpaqueAuth::sys("host-a", 1000, 100, &[4, 24]))).unwrap();
        assert_eq!(cred.flavor, AuthFlavor::Sys);
        assert_eq!(cred.uid, 1000);
        assert_eq!(cred.gid, 100);
        assert_eq!(cred.gids, vec![4, 24]);
        assert_eq!(cred.machine_name.as_deref(), Some("host-a"));
    }

    #[test]
    fn test_truncated_auth_sys_is_malformed() {
        let mut auth = OpaqueAuth::sys("host-a", 1000, 100, &[]);
        auth.body.truncate(10);
        assert_eq!(resolve_credential(&request(auth)), Err(CredentialError::Truncated));
    }

    #[test]
    fn test_too_many_gids_is_malformed() {
        let gids: Vec<u32> = (0..17).collect();
        let auth = OpaqueAuth::sys("h", 1, 1, &gids);
        assert_eq!(resolve_credential(&request(auth)), Err(CredentialError::TooManyGids(17)));
    }

    #[test]
    fn test_unknown_flavor_is_malformed() {
        let auth = OpaqueAuth {
            flavor: 390003,
            body: Bytes::new(),
        };
        assert_eq!(
            resolve_credential(&request(auth)),
            Err(CredentialError::UnsupportedFlavor(390003))
        );
    }
}
