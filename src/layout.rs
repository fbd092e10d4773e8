// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Deterministic descriptor-slot layout shared by the launcher and the
// workers. The launcher relocates every pipe end to a slot computed from
// `(rank, peer, role)` before forking; a worker can then address any of its
// channels as a pure function of its own rank, with no rendezvous.
//
// Three disjoint slot regions:
//   point-to-point  20..=655   one pipe per ordered pair of ranks
//   tree            697..=898  up/down pipes along the binary-heap tree
//   relay           900..=971  rank 0 <-> rank r pipes for rooted collectives
//
// Tree slots are grouped per heap node `m = rank + 1`: the six descriptors
// `700 + 6m - 3 ..= 700 + 6m + 2` all belong to that node (three read ends,
// then three write ends). Pipes toward heap nodes beyond the world size are
// still created so the per-node slot blocks stay uniform; nobody keeps
// their far ends.

use std::os::unix::io::RawFd;

/// Upper bound on the world size accepted by the launcher.
pub const MAX_WORLD_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Point-to-point slots
// ---------------------------------------------------------------------------

/// Slot where rank `me` reads traffic sent by `from`.
pub fn p2p_read_slot(me: usize, from: usize) -> RawFd {
    (20 * (2 * me + 1) + from) as RawFd
}

/// Slot where rank `me` writes traffic addressed to `to`.
pub fn p2p_write_slot(me: usize, to: usize) -> RawFd {
    (40 * (to + 1) + me) as RawFd
}

// ---------------------------------------------------------------------------
// Tree slots (heap node m = rank + 1, children 2m and 2m+1)
// ---------------------------------------------------------------------------

fn node(rank: usize) -> usize {
    rank + 1
}

/// Rank of the left child in the collective tree, if it is in the world.
pub fn left_child(rank: usize, size: usize) -> Option<usize> {
    let c = 2 * node(rank) - 1;
    (c < size).then_some(c)
}

/// Rank of the right child in the collective tree, if it is in the world.
pub fn right_child(rank: usize, size: usize) -> Option<usize> {
    let c = 2 * node(rank);
    (c < size).then_some(c)
}

/// Rank of the parent in the collective tree (`None` for rank 0).
pub fn parent(rank: usize) -> Option<usize> {
    (rank > 0).then(|| node(rank) / 2 - 1)
}

/// Slot where `rank` writes the byte/payload going up to its parent.
pub fn tree_up_write_slot(rank: usize) -> RawFd {
    (700 + 6 * node(rank)) as RawFd
}

/// Slot where `rank` reads what its parent sends down.
pub fn tree_down_read_slot(rank: usize) -> RawFd {
    (700 + 6 * node(rank) - 3) as RawFd
}

/// Slot where `rank` reads what child `which` (0 = left, 1 = right) sends up.
pub fn tree_up_read_slot(rank: usize, which: usize) -> RawFd {
    (700 + 6 * node(rank) + 1 + which - 3) as RawFd
}

/// Slot where `rank` writes what it sends down to child `which`.
pub fn tree_down_write_slot(rank: usize, which: usize) -> RawFd {
    (700 + 6 * node(rank) + 1 + which) as RawFd
}

// ---------------------------------------------------------------------------
// Relay slots (rank 0 <-> rank r, r > 0)
// ---------------------------------------------------------------------------

/// Rank 0 reads rank `r`'s relayed payload here.
pub fn relay_up_read_slot(r: usize) -> RawFd {
    (900 + 4 * (r + 1) + 1) as RawFd
}

/// Rank `r` writes its relayed payload toward rank 0 here.
pub fn relay_up_write_slot(r: usize) -> RawFd {
    (900 + 4 * (r + 1) + 2) as RawFd
}

/// Rank `r` reads the payload relayed back from rank 0 here.
pub fn relay_down_read_slot(r: usize) -> RawFd {
    (900 + 4 * (r + 1) + 3) as RawFd
}

/// Rank 0 writes the payload relayed to rank `r` here.
pub fn relay_down_write_slot(r: usize) -> RawFd {
    (900 + 4 * (r + 1)) as RawFd
}

// ---------------------------------------------------------------------------
// SlotTable
// ---------------------------------------------------------------------------

/// The complete set of pipes a launch of `n` workers creates, with per-rank
/// ownership. Built identically in the launcher (to create and relocate)
/// and in each worker (to close everything it does not own).
pub struct SlotTable {
    n: usize,
}

impl SlotTable {
    pub fn new(n: usize) -> SlotTable {
        SlotTable { n }
    }

    /// Every pipe to create, as `(read slot, write slot)` pairs.
    pub fn pipes(&self) -> Vec<(RawFd, RawFd)> {
        let n = self.n;
        let mut out = Vec::new();
        for to in 0..n {
            for from in 0..n {
                if from != to {
                    out.push((p2p_read_slot(to, from), p2p_write_slot(from, to)));
                }
            }
        }
        for rank in 0..n {
            let m = node(rank);
            for which in 0..2 {
                // up: heap node 2m+which -> node m
                out.push((
                    tree_up_read_slot(rank, which),
                    (700 + 6 * (2 * m + which)) as RawFd,
                ));
                // down: node m -> heap node 2m+which
                out.push((
                    (700 + 6 * (2 * m + which) - 3) as RawFd,
                    tree_down_write_slot(rank, which),
                ));
            }
        }
        for r in 1..n {
            out.push((relay_up_read_slot(r), relay_up_write_slot(r)));
            out.push((relay_down_read_slot(r), relay_down_write_slot(r)));
        }
        out
    }

    /// Every relocated slot, read and write ends alike.
    pub fn all_slots(&self) -> Vec<RawFd> {
        self.pipes()
            .into_iter()
            .flat_map(|(r, w)| [r, w])
            .collect()
    }

    /// The slots rank `rank` keeps across exec. Everything else in
    /// `all_slots` must be closed before the worker program runs so EOF
    /// semantics stay accurate.
    pub fn owned_by(&self, rank: usize) -> Vec<RawFd> {
        let n = self.n;
        let mut out = Vec::new();
        for peer in 0..n {
            if peer != rank {
                out.push(p2p_read_slot(rank, peer));
                out.push(p2p_write_slot(rank, peer));
            }
        }
        for which in 0..2 {
            out.push(tree_up_read_slot(rank, which));
            out.push(tree_down_write_slot(rank, which));
        }
        if rank > 0 {
            out.push(tree_up_write_slot(rank));
            out.push(tree_down_read_slot(rank));
            out.push(relay_up_write_slot(rank));
            out.push(relay_down_read_slot(rank));
        } else {
            for r in 1..n {
                out.push(relay_up_read_slot(r));
                out.push(relay_down_write_slot(r));
            }
        }
        out
    }
}
