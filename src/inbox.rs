// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Per-peer inbox and the shared matching-request slot.
//
// Each remote peer has an `Inbox` behind its own mutex, appended to only by
// that peer's reader thread and drained only by the caller. The caller's
// pending receive is published in a single `MatchSlot`; readers test every
// arriving frame against it and wake the caller through the peer's condvar.
// Lock order is always inbox -> match slot.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::frame::Frame;

/// Arrival-ordered queue of frames from one peer, plus the liveness flag
/// flipped by that peer's reader on EOF. Once `finished` is set no frame is
/// ever appended again.
pub struct Inbox {
    frames: VecDeque<Frame>,
    finished: bool,
}

impl Inbox {
    pub fn new() -> Inbox {
        Inbox {
            frames: VecDeque::new(),
            finished: false,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Remove and return the earliest-arrived frame matching `(count, tag)`.
    pub fn take_match(&mut self, count: u32, tag: i32) -> Option<Frame> {
        let idx = self.frames.iter().position(|f| f.matches(count, tag))?;
        self.frames.remove(idx)
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn set_finished(&mut self) {
        self.finished = true;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// One remote peer as seen by the caller: its inbox and the condvar the
/// matcher sleeps on. The inbox mutex doubles as the condvar's wait lock.
pub struct PeerState {
    pub inbox: Mutex<Inbox>,
    pub arrived: Condvar,
}

impl PeerState {
    pub fn new() -> PeerState {
        PeerState {
            inbox: Mutex::new(Inbox::new()),
            arrived: Condvar::new(),
        }
    }
}

impl Default for PeerState {
    fn default() -> Self {
        Self::new()
    }
}

/// The caller's pending receive, visible to every reader thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRequest {
    pub source: usize,
    pub count: u32,
    pub tag: i32,
}

/// Single shared request slot. The user API is single-threaded, so at most
/// one request is ever armed.
pub struct MatchSlot {
    pending: Option<MatchRequest>,
}

impl MatchSlot {
    pub fn new() -> MatchSlot {
        MatchSlot { pending: None }
    }

    pub fn publish(&mut self, source: usize, count: u32, tag: i32) {
        self.pending = Some(MatchRequest { source, count, tag });
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Does `frame`, freshly arrived from `source`, satisfy the pending
    /// request?
    pub fn satisfied_by(&self, source: usize, frame: &Frame) -> bool {
        match &self.pending {
            Some(req) => req.source == source && frame.matches(req.count, req.tag),
            None => false,
        }
    }

    /// Is the caller waiting on frames from `source` at all? EOF from that
    /// peer must wake it even without a matching frame.
    pub fn waiting_on(&self, source: usize) -> bool {
        matches!(&self.pending, Some(req) if req.source == source)
    }
}

impl Default for MatchSlot {
    fn default() -> Self {
        Self::new()
    }
}
