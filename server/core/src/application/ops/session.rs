// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! NFSv4.1 session operations
//!
//! SEQUENCE and CREATE_SESSION decide, under the slot lock, whether the
//! compound is new work, a retransmission to answer from the replay cache, or
//! out of order. New work claims the slot until the engine finishes the
//! compound; a retransmission arriving before then is told to retry later.

use crate::application::compound::context::{CompoundContext, ReplayState};
use crate::domain::compound::{OpArgs, OpResult, ResBody};
use crate::domain::session::{InFlight, Slot, SlotRef};
use crate::domain::status::Nfsstat4;
use tracing::{debug, info};

/// `EXCHGID4_FLAG_USE_NON_PNFS`
pub const EXCHGID4_FLAG_USE_NON_PNFS: u32 = 0x0001_0000;
/// `EXCHGID4_FLAG_CONFIRMED_R`
pub const EXCHGID4_FLAG_CONFIRMED_R: u32 = 0x8000_0000;

/// Outcome of checking a request's sequence id against its slot
#[derive(Debug)]
enum SlotCheck {
    New,
    Replay,
    /// Retransmission of a request that is still executing
    InProgress,
    Misordered,
}

/// Compare `sequence_id` with the slot. New work advances the slot, evicts
/// its previous reply and claims it.
fn check_slot(slot: &mut Slot, sequence_id: u32) -> SlotCheck {
    if sequence_id == slot.sequence_id.wrapping_add(1) {
        slot.sequence_id = sequence_id;
        slot.cache.evict();
        slot.in_progress = true;
        SlotCheck::New
    } else if sequence_id == slot.sequence_id {
        if slot.in_progress {
            SlotCheck::InProgress
        } else {
            SlotCheck::Replay
        }
    } else {
        SlotCheck::Misordered
    }
}

pub fn exchange_id(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::ExchangeId { verifier, owner, .. } = args else {
        return Nfsstat4::Badxdr;
    };

    let exchanged = ctx.state.clients.exchange_id(owner.clone(), *verifier);
    if let Some(old) = exchanged.superseded {
        let destroyed = ctx.state.sessions.destroy_client_sessions(old);
        info!(client_id = %old, sessions = destroyed, "Client rebooted, dropped its previous sessions");
    }
    let client = exchanged.record;
    let mut flags = EXCHGID4_FLAG_USE_NON_PNFS;
    if client.is_confirmed() {
        flags |= EXCHGID4_FLAG_CONFIRMED_R;
    }
    let sequence_id = client.create_session_slot().sequence_id.wrapping_add(1);

    debug!(client_id = %client.id, sequence_id, "EXCHANGE_ID");
    result.body = ResBody::ExchangeId {
        clientid: client.id,
        sequence_id,
        flags,
        server_owner: ctx.state.server_owner.clone(),
        server_scope: ctx.state.server_scope.clone(),
    };
    Nfsstat4::Ok
}

pub fn create_session(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::CreateSession {
        clientid,
        sequence,
        fore_attrs,
        ..
    } = args
    else {
        return Nfsstat4::Badxdr;
    };

    let Some(client) = ctx.state.clients.get(*clientid) else {
        return Nfsstat4::StaleClientid;
    };

    // Behind SEQUENCE the session slot owns the replay decision
    let outside_session = ctx.session.is_none();
    {
        let mut slot = client.create_session_slot();
        match check_slot(&mut slot, *sequence) {
            SlotCheck::New => {
                if !outside_session {
                    slot.in_progress = false;
                }
            }
            SlotCheck::Replay if outside_session => {
                return match slot.cache.cached() {
                    Some(cached) => {
                        ctx.replay = ReplayState::Serve(cached.deep_copy());
                        Nfsstat4::Ok
                    }
                    None => Nfsstat4::Delay,
                };
            }
            SlotCheck::InProgress if outside_session => return Nfsstat4::Delay,
            SlotCheck::Replay | SlotCheck::InProgress | SlotCheck::Misordered => {
                return Nfsstat4::SeqMisordered
            }
        }
    }
    if outside_session {
        ctx.claim_slot(InFlight {
            slot: SlotRef::CreateSession(client.clone()),
            sequence_id: *sequence,
        });
        ctx.replay = ReplayState::Store;
    }

    let negotiated = ctx.state.fore_channel.negotiate(fore_attrs);
    let session = ctx.state.sessions.create(client.id, negotiated);
    client.set_confirmed();

    info!(client_id = %client.id, session_id = %session.id, "Session created");
    result.body = ResBody::CreateSession {
        session_id: session.id,
        sequence: *sequence,
        flags: 0,
        fore_attrs: negotiated,
    };
    Nfsstat4::Ok
}

pub fn destroy_session(args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::DestroySession { session_id } = args else {
        return Nfsstat4::Badxdr;
    };
    if !ctx.state.sessions.destroy(session_id) {
        return Nfsstat4::Badsession;
    }
    info!(session_id = %session_id, "Session destroyed");
    Nfsstat4::Ok
}

pub fn sequence(args: &OpArgs, ctx: &mut CompoundContext<'_>, result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::Sequence {
        session_id,
        sequence_id,
        slot_id,
        cache_this,
        ..
    } = args
    else {
        return Nfsstat4::Badxdr;
    };

    if ctx.op_index != 0 {
        return Nfsstat4::SequencePos;
    }

    let Some(session) = ctx.state.sessions.lookup(session_id) else {
        return Nfsstat4::Badsession;
    };
    let Some(client) = ctx.state.clients.get(session.client_id) else {
        return Nfsstat4::Badsession;
    };

    let claimed = {
        let Some(mut slot) = session.slot(*slot_id) else {
            return Nfsstat4::Badslot;
        };
        match check_slot(&mut slot, *sequence_id) {
            SlotCheck::New => {
                if *cache_this {
                    ctx.replay = ReplayState::Store;
                }
                true
            }
            SlotCheck::Replay => match slot.cache.cached() {
                Some(cached) => {
                    ctx.replay = ReplayState::Serve(cached.deep_copy());
                    false
                }
                None => return Nfsstat4::RetryUncachedRep,
            },
            SlotCheck::InProgress => {
                debug!(session_id = %session.id, slot_id = *slot_id, "Retransmission of a request still in progress");
                return Nfsstat4::Delay;
            }
            SlotCheck::Misordered => return Nfsstat4::SeqMisordered,
        }
    };
    // The slot guard is released before claiming; a superseded claim may be
    // on the same slot
    if claimed {
        ctx.claim_slot(InFlight {
            slot: SlotRef::Session {
                session: session.clone(),
                slot_id: *slot_id,
            },
            sequence_id: *sequence_id,
        });
    }

    let highest_slot_id = session.highest_slot_id();
    result.body = ResBody::Sequence {
        session_id: session.id,
        sequence_id: *sequence_id,
        slot_id: *slot_id,
        highest_slot_id,
        target_highest_slot_id: highest_slot_id,
        status_flags: 0,
    };

    ctx.bind_session(session);
    ctx.reserve_lease(client);
    Nfsstat4::Ok
}

pub fn reclaim_complete(args: &OpArgs, ctx: &mut CompoundContext<'_>, _result: &mut OpResult) -> Nfsstat4 {
    let OpArgs::ReclaimComplete { one_fs } = args else {
        return Nfsstat4::Badxdr;
    };
    let Some(session) = &ctx.session else {
        return Nfsstat4::OpNotInSession;
    };

    // Per-filesystem reclaim is not tracked
    if *one_fs {
        return Nfsstat4::Ok;
    }

    let Some(client) = ctx.state.clients.get(session.client_id) else {
        return Nfsstat4::Badsession;
    };
    if !client.complete_reclaim() {
        return Nfsstat4::CompleteAlready;
    }
    debug!(client_id = %client.id, "Reclaim complete");
    Nfsstat4::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compound::CompoundResponse;

    #[test]
    fn test_check_slot_new_evicts() {
        let mut slot = Slot::default();
        slot.cache.store(CompoundResponse::default());
        assert!(matches!(check_slot(&mut slot, 1), SlotCheck::New));
        assert_eq!(slot.sequence_id, 1);
        assert!(slot.in_progress);
        assert!(!slot.cache.is_occupied());
    }

    #[test]
    fn test_check_slot_in_progress() {
        let mut slot = Slot::default();
        assert!(matches!(check_slot(&mut slot, 1), SlotCheck::New));
        assert!(matches!(check_slot(&mut slot, 1), SlotCheck::InProgress));

        assert!(slot.complete(1, Some(CompoundResponse::default())));
        assert!(matches!(check_slot(&mut slot, 1), SlotCheck::Replay));
    }

    #[test]
    fn test_check_slot_replay_and_misordered() {
        let mut slot = Slot {
            sequence_id: 5,
            ..Default::default()
        };
        assert!(matches!(check_slot(&mut slot, 5), SlotCheck::Replay));
        assert!(matches!(check_slot(&mut slot, 7), SlotCheck::Misordered));
        assert!(matches!(check_slot(&mut slot, 3), SlotCheck::Misordered));
        assert_eq!(slot.sequence_id, 5);
    }

    #[test]
    fn test_check_slot_wraps() {
        let mut slot = Slot {
            sequence_id: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(check_slot(&mut slot, 0), SlotCheck::New));
    }
}
