// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! ONC-RPC over TCP: record framing, call envelopes and the listener

pub mod codec;
pub mod server;

pub use codec::{CallEnvelope, ReplyBody, ReplyEnvelope, SmNotifyArgs, TransportError};
pub use server::{RpcDispatcher, RpcServer};
