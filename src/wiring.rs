// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Per-rank channel bundle: every pipe end one worker holds, grouped by
// role. Built two ways: `from_slots` adopts the descriptors a launcher
// relocated into this process (the production path), `local_world` wires a
// whole world out of fresh pipes inside one process (tests, demos,
// single-process experiments).

use std::io;

use crate::chan::Chan;
use crate::layout;

/// Channels to the tree parent: `up` is written, `down` is read.
pub struct ParentLink {
    pub up: Chan,
    pub down: Chan,
}

/// Channels to one tree child: `up` is read, `down` is written.
pub struct ChildLink {
    pub up: Chan,
    pub down: Chan,
}

/// The collective-tree channels of one rank.
pub struct TreeLinks {
    pub parent: Option<ParentLink>,
    pub left: Option<ChildLink>,
    pub right: Option<ChildLink>,
}

impl TreeLinks {
    fn empty() -> TreeLinks {
        TreeLinks {
            parent: None,
            left: None,
            right: None,
        }
    }
}

/// Relay channels between rank 0 and every other rank, used when a
/// collective's semantic root is not rank 0. Rank 0 holds the hub side
/// (`up_rx`/`down_tx`, indexed by rank); every other rank holds its spoke
/// (`up_tx`/`down_rx`).
pub struct RelayLinks {
    pub up_rx: Vec<Option<Chan>>,
    pub down_tx: Vec<Option<Chan>>,
    pub up_tx: Option<Chan>,
    pub down_rx: Option<Chan>,
}

impl RelayLinks {
    fn empty(size: usize) -> RelayLinks {
        RelayLinks {
            up_rx: (0..size).map(|_| None).collect(),
            down_tx: (0..size).map(|_| None).collect(),
            up_tx: None,
            down_rx: None,
        }
    }

    pub(crate) fn hub_up(&self, r: usize) -> &Chan {
        self.up_rx[r].as_ref().expect("no relay channel from that rank")
    }

    pub(crate) fn hub_down(&self, r: usize) -> &Chan {
        self.down_tx[r].as_ref().expect("no relay channel to that rank")
    }

    pub(crate) fn spoke_up(&self) -> &Chan {
        self.up_tx.as_ref().expect("rank 0 has no relay spoke")
    }

    pub(crate) fn spoke_down(&self) -> &Chan {
        self.down_rx.as_ref().expect("rank 0 has no relay spoke")
    }
}

/// Everything one rank holds: point-to-point channels indexed by peer,
/// tree links, relay links, and stray inherited endpoints (tree pipes
/// toward heap nodes outside the world) kept only so finalize closes them.
pub struct Wiring {
    pub p2p_rx: Vec<Option<Chan>>,
    pub p2p_tx: Vec<Option<Chan>>,
    pub tree: TreeLinks,
    pub relay: RelayLinks,
    pub stray: Vec<Chan>,
}

impl Wiring {
    fn empty(size: usize) -> Wiring {
        Wiring {
            p2p_rx: (0..size).map(|_| None).collect(),
            p2p_tx: (0..size).map(|_| None).collect(),
            tree: TreeLinks::empty(),
            relay: RelayLinks::empty(size),
            stray: Vec::new(),
        }
    }

    /// Adopt the descriptor slots the launcher relocated for `rank`.
    /// Must be called exactly once per process, before any channel I/O.
    pub fn from_slots(rank: usize, size: usize) -> Wiring {
        let mut w = Wiring::empty(size);

        for peer in 0..size {
            if peer != rank {
                w.p2p_rx[peer] = Some(Chan::from_slot(layout::p2p_read_slot(rank, peer)));
                w.p2p_tx[peer] = Some(Chan::from_slot(layout::p2p_write_slot(rank, peer)));
            }
        }

        if rank > 0 {
            w.tree.parent = Some(ParentLink {
                up: Chan::from_slot(layout::tree_up_write_slot(rank)),
                down: Chan::from_slot(layout::tree_down_read_slot(rank)),
            });
        }
        for which in 0..2 {
            let up = Chan::from_slot(layout::tree_up_read_slot(rank, which));
            let down = Chan::from_slot(layout::tree_down_write_slot(rank, which));
            let child = if which == 0 {
                layout::left_child(rank, size)
            } else {
                layout::right_child(rank, size)
            };
            if child.is_some() {
                let link = ChildLink { up, down };
                if which == 0 {
                    w.tree.left = Some(link);
                } else {
                    w.tree.right = Some(link);
                }
            } else {
                w.stray.push(up);
                w.stray.push(down);
            }
        }

        if rank == 0 {
            for r in 1..size {
                w.relay.up_rx[r] = Some(Chan::from_slot(layout::relay_up_read_slot(r)));
                w.relay.down_tx[r] = Some(Chan::from_slot(layout::relay_down_write_slot(r)));
            }
        } else {
            w.relay.up_tx = Some(Chan::from_slot(layout::relay_up_write_slot(rank)));
            w.relay.down_rx = Some(Chan::from_slot(layout::relay_down_read_slot(rank)));
        }

        w
    }
}

/// Wire a complete `size`-rank world out of fresh pipes, one bundle per
/// rank. Each bundle can be moved to its own thread and driven through
/// `Mimpi::with_wiring`.
pub fn local_world(size: usize) -> io::Result<Vec<Wiring>> {
    let mut worlds: Vec<Wiring> = (0..size).map(|_| Wiring::empty(size)).collect();

    for to in 0..size {
        for from in 0..size {
            if from != to {
                let (rx, tx) = Chan::pair()?;
                worlds[to].p2p_rx[from] = Some(rx);
                worlds[from].p2p_tx[to] = Some(tx);
            }
        }
    }

    for child in 1..size {
        let par = layout::parent(child).expect("non-root rank has a parent");
        let (up_rx, up_tx) = Chan::pair()?;
        let (down_rx, down_tx) = Chan::pair()?;
        worlds[child].tree.parent = Some(ParentLink {
            up: up_tx,
            down: down_rx,
        });
        let link = ChildLink {
            up: up_rx,
            down: down_tx,
        };
        if layout::left_child(par, size) == Some(child) {
            worlds[par].tree.left = Some(link);
        } else {
            worlds[par].tree.right = Some(link);
        }
    }

    for r in 1..size {
        let (up_rx, up_tx) = Chan::pair()?;
        let (down_rx, down_tx) = Chan::pair()?;
        worlds[0].relay.up_rx[r] = Some(up_rx);
        worlds[0].relay.down_tx[r] = Some(down_tx);
        worlds[r].relay.up_tx = Some(up_tx);
        worlds[r].relay.down_rx = Some(down_rx);
    }

    Ok(worlds)
}
