// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Compound Execution Engine
//!
//! Runs one NFSv4 COMPOUND to completion on the calling thread:
//!
//! 1. Entry validation: minor version, empty and oversized compounds, a
//!    non-solo EXCHANGE_ID, then the caller's credential. A credential that
//!    cannot be decoded drops the request; every other outcome is a reply.
//! 2. The per-op loop: session op ceiling, descriptor resolution, the
//!    file-handle and export-permission gate, the handler call. The first
//!    non-OK status ends the loop and the result list stops at that op.
//! 3. Replay: when SEQUENCE recognises a retransmission the whole response
//!    becomes the cached one; otherwise the slot the compound claimed is
//!    released, receiving a deep copy of the finished response when asked.
//! 4. A reserved lease is renewed under its mutex, and the context is
//!    dropped, releasing every reference it took.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Sequencing state machine of the NFSv4 server

pub mod context;
pub mod optab;

use crate::application::server_state::ServerState;
use crate::domain::compound::{CompoundRequest, CompoundResponse, OpResult, NFS4_MAX_OPERATIONS};
use crate::domain::credential::{resolve_credential, CredentialError, RpcRequest};
use crate::domain::opcode::{MinorVersion, OpCode};
use crate::domain::status::Nfsstat4;
use context::{CompoundContext, ReplayState};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, trace, warn};

/// A compound that must be dropped without any reply
#[derive(Debug, Error)]
pub enum CompoundError {
    #[error("Malformed credential: {0}")]
    MalformedCredential(#[from] CredentialError),
}

#[derive(Clone)]
pub struct CompoundEngine {
    state: Arc<ServerState>,
}

impl CompoundEngine {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Execute one COMPOUND. `Err` means the request is dropped.
    pub fn process(
        &self,
        request: &RpcRequest,
        compound: CompoundRequest,
    ) -> Result<CompoundResponse, CompoundError> {
        let CompoundRequest {
            minor_version,
            tag,
            ops,
        } = compound;
        let mut response = CompoundResponse::new(tag);

        let minor = match MinorVersion::try_from(minor_version) {
            Ok(minor) => minor,
            Err(version) => {
                error!("Bad Minor Version {}", version);
                return Ok(finish_rejected(response, Nfsstat4::MinorVersMismatch));
            }
        };

        if ops.is_empty() {
            warn!("An empty COMPOUND (no operation in it) was received");
            return Ok(finish_rejected(response, Nfsstat4::Ok));
        }

        if ops.len() > NFS4_MAX_OPERATIONS {
            warn!("A COMPOUND with too many operations ({}) was received", ops.len());
            return Ok(finish_rejected(response, Nfsstat4::Resource));
        }

        // EXCHANGE_ID is only legal alone or behind SEQUENCE
        if ops.len() > 1 && ops[0].opcode == OpCode::ExchangeId as u32 {
            response
                .results
                .push(OpResult::status(OpCode::ExchangeId, Nfsstat4::NotOnlyOp));
            return Ok(finish_rejected(response, Nfsstat4::NotOnlyOp));
        }

        let credential = resolve_credential(request)?;

        debug!("COMPOUND: There are {} operations", ops.len());

        let mut ctx = CompoundContext::new(&self.state, minor, credential, ops.len());
        response.results.reserve(ops.len());
        let mut status = Nfsstat4::Ok;
        let mut served_from_cache = false;

        for (i, argop) in ops.iter().enumerate() {
            ctx.op_index = i;

            if minor == MinorVersion::V41 {
                if let Some(session) = &ctx.session {
                    if session.max_operations() as usize == i {
                        status = Nfsstat4::TooManyOps;
                        let op = OpCode::from_u32(argop.opcode).unwrap_or(OpCode::Illegal);
                        debug!("Session {} allows only {} operations", session.id, i);
                        record_op(op.name(), status, None);
                        response.results.push(OpResult::status(op, status));
                        break;
                    }
                }
            }

            let desc = optab::resolve(minor, argop.opcode);
            debug!("Request {} is {} = {}", i, desc.op as u32, desc.name);

            if !desc.required.is_empty() {
                let fh_status = ctx.current.fh.check();
                if !fh_status.is_ok() {
                    status = fh_status;
                    debug!(
                        "Status of {} due to empty CurrentFH in position {} = {}",
                        desc.name, i, status
                    );
                    record_op(desc.name, status, None);
                    response.results.push(OpResult::status(desc.op, status));
                    break;
                }

                trace!(
                    "Check export perms export = {:?} req = {:?}",
                    ctx.permissions(),
                    desc.required
                );
                if !ctx.permissions().contains(desc.required) {
                    status = if desc.required.wants_modify() {
                        Nfsstat4::Rofs
                    } else {
                        Nfsstat4::Access
                    };
                    debug!(
                        "Status of {} due to export permissions in position {} = {}",
                        desc.name, i, status
                    );
                    record_op(desc.name, status, None);
                    response.results.push(OpResult::status(desc.op, status));
                    break;
                }
            }

            let started = Instant::now();
            let mut result = OpResult::new(desc.op);
            status = (desc.handler)(&argop.args, &mut ctx, &mut result);
            result.status = status;
            record_op(desc.name, status, Some(started));
            ctx.log_handles();
            response.results.push(result);

            if !status.is_ok() {
                debug!("Status of {} in position {} = {}", desc.name, i, status);
                break;
            }

            if let ReplayState::Serve(_) = ctx.replay {
                if let ReplayState::Serve(cached) = std::mem::take(&mut ctx.replay) {
                    trace!("Use session replay cache");
                    response = cached;
                    status = response.status;
                    served_from_cache = true;
                    counter!("nfs4_replay_hits_total").increment(1);
                }
                break;
            }
        }

        response.status = status;

        // Release the claimed slot, keeping the reply for a retransmission.
        // A replayed response is never re-stored.
        if let Some(in_flight) = ctx.take_in_flight() {
            let reply = match std::mem::take(&mut ctx.replay) {
                ReplayState::Store if !served_from_cache => {
                    trace!("Save result in session replay cache");
                    Some(response.deep_copy())
                }
                _ => None,
            };
            if !in_flight.complete(reply) {
                warn!("Replay slot was released before the compound finished");
            }
        }

        if let Some(client) = ctx.take_reserved_lease() {
            let mut lease = client.lease();
            lease.renew();
        }

        if !status.is_ok() {
            debug!("End status = {} lastindex = {}", status, ctx.op_index);
        }
        counter!("nfs4_compounds_total", "status" => status.as_str()).increment(1);

        drop(ctx);
        Ok(response)
    }
}

fn finish_rejected(mut response: CompoundResponse, status: Nfsstat4) -> CompoundResponse {
    response.status = status;
    counter!("nfs4_compounds_total", "status" => status.as_str()).increment(1);
    response
}

fn record_op(name: &'static str, status: Nfsstat4, started: Option<Instant>) {
    counter!("nfs4_ops_total", "op" => name, "status" => status.as_str()).increment(1);
    if let Some(started) = started {
        histogram!("nfs4_op_duration_seconds", "op" => name).record(started.elapsed().as_secs_f64());
    }
}
