// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reader pool: one background thread per remote peer. Each thread owns the
// read end of that peer's point-to-point channel, appends arriving frames
// to the peer's inbox, and wakes a matcher whose pending request the frame
// satisfies. EOF flips the inbox's liveness flag; the stop token ends the
// thread at finalize without touching liveness.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::chan::{Chan, ReadAbort, StopToken};
use crate::frame::recv_frame;
use crate::runtime::World;

pub(crate) fn spawn(
    world: Arc<World>,
    peer: usize,
    chan: Chan,
    stop: Arc<StopToken>,
) -> JoinHandle<()> {
    thread::spawn(move || reader_loop(&world, peer, chan, &stop))
}

fn reader_loop(world: &World, peer: usize, chan: Chan, stop: &StopToken) {
    let state = &world.peers[peer];
    loop {
        match recv_frame(&chan, stop) {
            Ok(frame) => {
                let mut inbox = state.inbox.lock().unwrap();
                {
                    let slot = world.match_slot.lock().unwrap();
                    if slot.satisfied_by(peer, &frame) {
                        state.arrived.notify_one();
                    }
                }
                inbox.push(frame);
            }
            Err(ReadAbort::Cancelled) => return,
            Err(ReadAbort::Closed) => {
                let mut inbox = state.inbox.lock().unwrap();
                inbox.set_finished();
                let slot = world.match_slot.lock().unwrap();
                if slot.waiting_on(peer) {
                    state.arrived.notify_one();
                }
                return;
            }
        }
    }
}
