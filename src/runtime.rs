// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The per-process runtime: one `Mimpi` value owns everything a rank holds:
// the shared state the reader pool works against, the outgoing
// point-to-point channels, and the collective-tree channels. All operations
// take `&mut self`; the API is single-caller by contract and the borrow
// checker enforces it.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::chan::{self, Chan, RemoteClosed, StopSignal};
use crate::frame::send_frame;
use crate::inbox::{MatchSlot, PeerState};
use crate::layout::MAX_WORLD_SIZE;
use crate::reader;
use crate::wiring::{RelayLinks, TreeLinks, Wiring};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Operation outcome other than success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimpiError {
    /// Point-to-point source or destination is the calling rank itself.
    AttemptedSelfOp,
    /// A rank argument is outside `0..world_size`.
    NoSuchRank,
    /// The peer required by this operation has terminated.
    RemoteFinished,
    /// Reserved: deadlock detection is a configuration bit this runtime
    /// stores but does not act on.
    DeadlockDetected,
}

pub type MimpiResult<T> = Result<T, MimpiError>;

impl fmt::Display for MimpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MimpiError::AttemptedSelfOp => "point-to-point operation with self",
            MimpiError::NoSuchRank => "rank outside the world",
            MimpiError::RemoteFinished => "remote process has finished",
            MimpiError::DeadlockDetected => "deadlock detected",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for MimpiError {}

impl From<RemoteClosed> for MimpiError {
    fn from(_: RemoteClosed) -> MimpiError {
        MimpiError::RemoteFinished
    }
}

// ---------------------------------------------------------------------------
// Environment publication (launcher -> worker)
// ---------------------------------------------------------------------------

/// Key under which the launcher publishes the world size.
pub(crate) const WORLD_SIZE_VAR: &str = "MIMPI_n";

/// Key under which the launcher publishes the rank of the child with `pid`.
pub(crate) fn rank_var(pid: u32) -> String {
    format!("MIMPI_{pid}")
}

fn env_usize(key: &str) -> io::Result<usize> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{key} is not published; was this process started by mimpirun?"),
            )
        })
}

// ---------------------------------------------------------------------------
// Shared state and the runtime value
// ---------------------------------------------------------------------------

/// State shared between the caller and the reader pool.
pub(crate) struct World {
    pub rank: usize,
    pub size: usize,
    pub peers: Vec<PeerState>,
    pub match_slot: Mutex<MatchSlot>,
}

/// Tree, relay, and stray channels, dropped as one unit: on the first
/// collective fault (and at finalize) they all close, so neighbours observe
/// EOF on their own pipes.
pub(crate) struct GroupChannels {
    pub tree: TreeLinks,
    pub relay: RelayLinks,
    _stray: Vec<Chan>,
}

pub struct Mimpi {
    pub(crate) world: Arc<World>,
    pub(crate) group: Option<GroupChannels>,
    p2p_tx: Vec<Option<Chan>>,
    readers: Vec<JoinHandle<()>>,
    stop: Option<StopSignal>,
    deadlock_detection: bool,
}

impl Mimpi {
    /// Worker-side initialization: read the launcher's publication, adopt
    /// the inherited descriptor slots, and spawn the reader pool.
    pub fn init(enable_deadlock_detection: bool) -> io::Result<Mimpi> {
        let size = env_usize(WORLD_SIZE_VAR)?;
        let pid = unsafe { libc::getpid() } as u32;
        let rank = env_usize(&rank_var(pid))?;
        if size == 0 || size > MAX_WORLD_SIZE || rank >= size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("published world ({rank} of {size}) is not valid"),
            ));
        }
        let wiring = Wiring::from_slots(rank, size);
        Mimpi::with_wiring(rank, size, wiring, enable_deadlock_detection)
    }

    /// Build a runtime around an explicit channel bundle (see
    /// `wiring::local_world`).
    pub fn with_wiring(
        rank: usize,
        size: usize,
        wiring: Wiring,
        enable_deadlock_detection: bool,
    ) -> io::Result<Mimpi> {
        assert!(rank < size, "rank outside the world");
        assert_eq!(wiring.p2p_rx.len(), size, "wiring does not fit the world");
        chan::ignore_sigpipe();

        let world = Arc::new(World {
            rank,
            size,
            peers: (0..size).map(|_| PeerState::new()).collect(),
            match_slot: Mutex::new(MatchSlot::new()),
        });

        let (stop, token) = chan::stop_pair()?;
        let mut readers = Vec::with_capacity(size.saturating_sub(1));
        for (peer, rx) in wiring.p2p_rx.into_iter().enumerate() {
            if let Some(rx) = rx {
                readers.push(reader::spawn(
                    Arc::clone(&world),
                    peer,
                    rx,
                    Arc::clone(&token),
                ));
            }
        }

        Ok(Mimpi {
            world,
            group: Some(GroupChannels {
                tree: wiring.tree,
                relay: wiring.relay,
                _stray: wiring.stray,
            }),
            p2p_tx: wiring.p2p_tx,
            readers,
            stop: Some(stop),
            deadlock_detection: enable_deadlock_detection,
        })
    }

    pub fn world_rank(&self) -> usize {
        self.world.rank
    }

    pub fn world_size(&self) -> usize {
        self.world.size
    }

    /// The configuration bit passed at init. Stored, never acted on.
    pub fn deadlock_detection(&self) -> bool {
        self.deadlock_detection
    }

    fn check_peer(&self, peer: usize) -> MimpiResult<()> {
        if peer == self.world.rank {
            return Err(MimpiError::AttemptedSelfOp);
        }
        if peer >= self.world.size {
            return Err(MimpiError::NoSuchRank);
        }
        Ok(())
    }

    /// Blocking send of `data` with `tag` to `destination`. Completes once
    /// the frame is fully in the pipe; `RemoteFinished` if the destination
    /// is gone.
    pub fn send(&mut self, data: &[u8], destination: usize, tag: i32) -> MimpiResult<()> {
        self.check_peer(destination)?;
        let chan = self.p2p_tx[destination]
            .as_ref()
            .expect("no channel to peer");
        send_frame(chan, data, tag)?;
        Ok(())
    }

    /// Blocking receive into `data` from `source`: returns the earliest
    /// frame whose count equals `data.len()` and whose tag matches `tag`
    /// (`ANY_TAG` matches everything). `RemoteFinished` once the source has
    /// terminated and no such frame remains.
    pub fn recv(&mut self, data: &mut [u8], source: usize, tag: i32) -> MimpiResult<()> {
        self.check_peer(source)?;
        assert!(
            data.len() <= u32::MAX as usize,
            "receive buffer does not fit a frame header"
        );
        let count = data.len() as u32;

        let peer = &self.world.peers[source];
        let mut inbox = peer.inbox.lock().unwrap();

        // Fast path: the frame is already queued.
        if let Some(frame) = inbox.take_match(count, tag) {
            data.copy_from_slice(&frame.payload);
            return Ok(());
        }

        // Publish the request so the reader can wake us, then sleep on the
        // peer's condvar with the inbox lock as the wait lock. Every wake is
        // followed by a rescan from the head, which keeps arrival order.
        self.world
            .match_slot
            .lock()
            .unwrap()
            .publish(source, count, tag);
        loop {
            if let Some(frame) = inbox.take_match(count, tag) {
                self.world.match_slot.lock().unwrap().clear();
                data.copy_from_slice(&frame.payload);
                return Ok(());
            }
            if inbox.finished() {
                self.world.match_slot.lock().unwrap().clear();
                return Err(MimpiError::RemoteFinished);
            }
            inbox = peer.arrived.wait(inbox).unwrap();
        }
    }

    /// Tear everything down: stop and join the reader pool, then close the
    /// tree and relay channels, then the point-to-point channels. Dropping
    /// the runtime performs the same teardown.
    pub fn finalize(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.raise();
        }
        for handle in self.readers.drain(..) {
            let _ = handle.join();
        }
        self.group = None;
        for tx in self.p2p_tx.iter_mut() {
            *tx = None;
        }
    }
}

impl Drop for Mimpi {
    fn drop(&mut self) {
        self.shutdown();
    }
}
