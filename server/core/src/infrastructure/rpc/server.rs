// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! TCP listener for NFSv4, MOUNT v3 and NLM v4 calls
//!
//! One tokio task per connection reads records; each call is handed to the
//! blocking pool so a compound runs to completion on a single worker thread.
//! Replies from concurrent calls on one connection share the write half
//! behind an async mutex. Connection tasks belong to the accept task and call
//! tasks to their connection, so stopping the listener tears all of them down.
//! A compound already on a worker still finishes; only its reply is dropped.

use super::codec::{
    self, CallEnvelope, ReplyBody, ReplyEnvelope, SmNotifyArgs, TransportError, MOUNTPROC3_UMNTALL,
    MOUNT_PROGRAM, MOUNT_V3, NFSPROC4_COMPOUND, NFSPROC4_NULL, NFS_PROGRAM, NFS_V4, NLMPROC4_SM_NOTIFY,
    NLM_PROGRAM, NLM_V4,
};
use crate::application::compound::CompoundEngine;
use crate::application::legacy::LegacyService;
use crate::domain::compound::CompoundRequest;
use crate::domain::credential::RpcRequest;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

/// Routes decoded calls to the compound engine or the legacy handlers
#[derive(Clone)]
pub struct RpcDispatcher {
    engine: CompoundEngine,
    legacy: LegacyService,
}

impl RpcDispatcher {
    pub fn new(engine: CompoundEngine, legacy: LegacyService) -> Self {
        Self { engine, legacy }
    }

    pub fn engine(&self) -> &CompoundEngine {
        &self.engine
    }

    /// Run one call. `None` means the call is dropped without a reply.
    pub fn dispatch(&self, call: CallEnvelope, client_addr: Option<SocketAddr>) -> Option<ReplyEnvelope> {
        let body = match (call.program, call.version, call.procedure) {
            (NFS_PROGRAM, NFS_V4, NFSPROC4_NULL) => ReplyBody::Void,
            (NFS_PROGRAM, NFS_V4, NFSPROC4_COMPOUND) => {
                let compound: CompoundRequest = match codec::decode(&call.args) {
                    Ok(compound) => compound,
                    Err(e) => {
                        warn!(xid = call.xid, "Undecodable COMPOUND arguments: {}", e);
                        return Some(reply(call.xid, ReplyBody::GarbageArgs));
                    }
                };
                let request = RpcRequest {
                    xid: call.xid,
                    auth: call.auth,
                    client_addr,
                };
                match self.engine.process(&request, compound) {
                    Ok(response) => ReplyBody::Compound(response),
                    Err(e) => {
                        warn!(xid = call.xid, "Dropping COMPOUND request: {}", e);
                        return None;
                    }
                }
            }
            (MOUNT_PROGRAM, MOUNT_V3, MOUNTPROC3_UMNTALL) => {
                self.legacy.umount_all();
                ReplyBody::Void
            }
            (NLM_PROGRAM, NLM_V4, NLMPROC4_SM_NOTIFY) => {
                let args: SmNotifyArgs = match codec::decode(&call.args) {
                    Ok(args) => args,
                    Err(e) => {
                        warn!(xid = call.xid, "Undecodable SM_NOTIFY arguments: {}", e);
                        return Some(reply(call.xid, ReplyBody::GarbageArgs));
                    }
                };
                self.legacy.sm_notify(&args.name, args.state);
                ReplyBody::Void
            }
            (NFS_PROGRAM, NFS_V4, _) | (MOUNT_PROGRAM, MOUNT_V3, _) | (NLM_PROGRAM, NLM_V4, _) => ReplyBody::ProcUnavail,
            _ => ReplyBody::ProgUnavail,
        };
        Some(reply(call.xid, body))
    }
}

fn reply(xid: u32, body: ReplyBody) -> ReplyEnvelope {
    ReplyEnvelope { xid, body }
}

pub struct RpcServer {
    dispatcher: RpcDispatcher,
    bind_address: SocketAddr,
    local_addr: Arc<Mutex<Option<SocketAddr>>>,
    server_handle: Arc<Mutex<Option<AbortHandle>>>,
}

impl RpcServer {
    pub fn new(dispatcher: RpcDispatcher, bind_address: SocketAddr) -> Self {
        Self {
            dispatcher,
            bind_address,
            local_addr: Arc::new(Mutex::new(None)),
            server_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Bind the listener and spawn the accept loop
    pub async fn start(&self) -> Result<SocketAddr, TransportError> {
        let listener = TcpListener::bind(self.bind_address).await?;
        let local_addr = listener.local_addr()?;
        info!("NFS listener bound to {}", local_addr);

        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move {
            // Dropped with this task, aborting every connection
            let mut connections = JoinSet::new();
            loop {
                let accepted = tokio::select! {
                    accepted = listener.accept() => accepted,
                    Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                };
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                debug!("Accepted connection from {}", peer);

                let dispatcher = dispatcher.clone();
                connections.spawn(async move {
                    if let Err(e) = serve_connection(dispatcher, stream, peer).await {
                        warn!("Connection from {} closed: {}", peer, e);
                    }
                });
            }
        });

        *self.server_handle.lock() = Some(handle.abort_handle());
        *self.local_addr.lock() = Some(local_addr);
        Ok(local_addr)
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.server_handle.lock().take() {
            handle.abort();
            info!("NFS listener stopped");
        } else {
            warn!("NFS listener was not running");
        }
        *self.local_addr.lock() = None;
    }

    pub fn is_running(&self) -> bool {
        self.server_handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

async fn serve_connection(
    dispatcher: RpcDispatcher,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), TransportError> {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(tokio::sync::Mutex::new(writer));
    let mut calls = JoinSet::new();

    while let Some(record) = codec::read_record(&mut reader).await? {
        let call: CallEnvelope = match codec::decode(&record) {
            Ok(call) => call,
            Err(e) => {
                warn!("Dropping undecodable call from {}: {}", peer, e);
                continue;
            }
        };
        trace!(xid = call.xid, program = call.program, procedure = call.procedure, "Call received");

        while calls.try_join_next().is_some() {}
        let dispatcher = dispatcher.clone();
        let writer = writer.clone();
        calls.spawn(async move {
            let xid = call.xid;
            let reply = match tokio::task::spawn_blocking(move || dispatcher.dispatch(call, Some(peer))).await {
                Ok(Some(reply)) => reply,
                Ok(None) => return,
                Err(e) => {
                    error!(xid, "Worker failed while processing call: {}", e);
                    return;
                }
            };
            let mut writer = writer.lock().await;
            if let Err(e) = send_reply(&mut *writer, &reply).await {
                error!(xid, "Failed to send reply: {}", e);
            }
        });
    }

    // Replies still owed to a client that stopped sending
    while calls.join_next().await.is_some() {}
    Ok(())
}

async fn send_reply<W>(writer: &mut W, reply: &ReplyEnvelope) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let payload = codec::encode(reply)?;
    codec::write_record(writer, &payload).await
}
