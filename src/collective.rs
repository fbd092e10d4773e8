// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tree collective engine: barrier, broadcast, and reduction over the
// dedicated binary-heap tree channels, independent of the point-to-point
// inboxes. Every operation is a fixed sequence of pipe reads and writes;
// the first transfer that observes peer death makes the rank close all of
// its group channels (so the fault spreads as EOF to its neighbours) and
// return `RemoteFinished`. Caller buffers are only written after every
// pipe step has succeeded.

use crate::chan::RemoteClosed;
use crate::runtime::{GroupChannels, Mimpi, MimpiError, MimpiResult};

// One-byte sync tokens, one value per collective. Never inspected on the
// receive side.
const BCAST_TOKEN: u8 = 1;
const REDUCE_TOKEN: u8 = 2;
const BARRIER_TOKEN: u8 = 3;

// ---------------------------------------------------------------------------
// Reduction operators
// ---------------------------------------------------------------------------

/// Element-wise operator for `reduce`. Operands are unsigned bytes; `Sum`
/// and `Prod` wrap modulo 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Max,
    Min,
    Sum,
    Prod,
}

impl ReduceOp {
    /// `acc[i] = op(acc[i], operand[i])` for every element.
    pub fn fold_into(self, acc: &mut [u8], operand: &[u8]) {
        debug_assert_eq!(acc.len(), operand.len());
        match self {
            ReduceOp::Max => {
                for (a, b) in acc.iter_mut().zip(operand) {
                    if *b > *a {
                        *a = *b;
                    }
                }
            }
            ReduceOp::Min => {
                for (a, b) in acc.iter_mut().zip(operand) {
                    if *b < *a {
                        *a = *b;
                    }
                }
            }
            ReduceOp::Sum => {
                for (a, b) in acc.iter_mut().zip(operand) {
                    *a = a.wrapping_add(*b);
                }
            }
            ReduceOp::Prod => {
                for (a, b) in acc.iter_mut().zip(operand) {
                    *a = a.wrapping_mul(*b);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Collective operations
// ---------------------------------------------------------------------------

impl Mimpi {
    /// Block until every rank in the world has entered the barrier.
    pub fn barrier(&mut self) -> MimpiResult<()> {
        let group = match self.group.as_ref() {
            Some(g) => g,
            None => return Err(MimpiError::RemoteFinished),
        };
        match run_barrier(group) {
            Ok(()) => Ok(()),
            Err(RemoteClosed) => {
                self.group = None;
                Err(MimpiError::RemoteFinished)
            }
        }
    }

    /// Broadcast `data` from `root` to every rank. On return, every rank's
    /// buffer equals the root's. All ranks must pass the same length.
    pub fn bcast(&mut self, data: &mut [u8], root: usize) -> MimpiResult<()> {
        if root >= self.world.size {
            return Err(MimpiError::NoSuchRank);
        }
        let me = self.world.rank;
        let group = match self.group.as_ref() {
            Some(g) => g,
            None => return Err(MimpiError::RemoteFinished),
        };
        match run_bcast(group, me, data, root) {
            Ok(()) => Ok(()),
            Err(RemoteClosed) => {
                self.group = None;
                Err(MimpiError::RemoteFinished)
            }
        }
    }

    /// Element-wise reduction of every rank's `send_data` with `op`.
    /// Returns `Some(result)` on `root`, `None` everywhere else. All ranks
    /// must pass the same length.
    pub fn reduce(
        &mut self,
        send_data: &[u8],
        op: ReduceOp,
        root: usize,
    ) -> MimpiResult<Option<Vec<u8>>> {
        if root >= self.world.size {
            return Err(MimpiError::NoSuchRank);
        }
        let me = self.world.rank;
        let group = match self.group.as_ref() {
            Some(g) => g,
            None => return Err(MimpiError::RemoteFinished),
        };
        match run_reduce(group, me, send_data, op, root) {
            Ok(out) => Ok(out),
            Err(RemoteClosed) => {
                self.group = None;
                Err(MimpiError::RemoteFinished)
            }
        }
    }
}

fn run_barrier(g: &GroupChannels) -> Result<(), RemoteClosed> {
    let mut token = [0u8; 1];
    if let Some(c) = &g.tree.left {
        c.up.read_exact(&mut token)?;
    }
    if let Some(c) = &g.tree.right {
        c.up.read_exact(&mut token)?;
    }
    if let Some(p) = &g.tree.parent {
        p.up.write_all(&[BARRIER_TOKEN])?;
        p.down.read_exact(&mut token)?;
    }
    if let Some(c) = &g.tree.left {
        c.down.write_all(&[BARRIER_TOKEN])?;
    }
    if let Some(c) = &g.tree.right {
        c.down.write_all(&[BARRIER_TOKEN])?;
    }
    Ok(())
}

fn run_bcast(
    g: &GroupChannels,
    me: usize,
    data: &mut [u8],
    root: usize,
) -> Result<(), RemoteClosed> {
    let mut token = [0u8; 1];

    // A non-zero root ships its payload to the tree root over its relay.
    if me == root && me != 0 {
        g.relay.spoke_up().write_all(data)?;
    }

    if let Some(c) = &g.tree.left {
        c.up.read_exact(&mut token)?;
    }
    if let Some(c) = &g.tree.right {
        c.up.read_exact(&mut token)?;
    }

    // Stage the inbound payload; the caller's buffer is written only after
    // the whole sequence has succeeded.
    let mut staged = vec![0u8; data.len()];
    if me == root {
        staged.copy_from_slice(data);
    }
    if me == 0 && root != 0 {
        g.relay.hub_up(root).read_exact(&mut staged)?;
    }
    if let Some(p) = &g.tree.parent {
        p.up.write_all(&[BCAST_TOKEN])?;
        p.down.read_exact(&mut staged)?;
    }

    if let Some(c) = &g.tree.left {
        c.down.write_all(&staged)?;
    }
    if let Some(c) = &g.tree.right {
        c.down.write_all(&staged)?;
    }

    if me != root {
        data.copy_from_slice(&staged);
    }
    Ok(())
}

fn run_reduce(
    g: &GroupChannels,
    me: usize,
    send_data: &[u8],
    op: ReduceOp,
    root: usize,
) -> Result<Option<Vec<u8>>, RemoteClosed> {
    let count = send_data.len();
    let mut token = [0u8; 1];
    let mut acc = send_data.to_vec();

    if let Some(c) = &g.tree.left {
        let mut partial = vec![0u8; count];
        c.up.read_exact(&mut partial)?;
        op.fold_into(&mut acc, &partial);
    }
    if let Some(c) = &g.tree.right {
        let mut partial = vec![0u8; count];
        c.up.read_exact(&mut partial)?;
        op.fold_into(&mut acc, &partial);
    }

    // Hand the partial result up, then wait for the parent to confirm it
    // has consumed it before releasing the children below.
    if let Some(p) = &g.tree.parent {
        p.up.write_all(&acc)?;
        p.down.read_exact(&mut token)?;
    }
    if let Some(c) = &g.tree.left {
        c.down.write_all(&[REDUCE_TOKEN])?;
    }
    if let Some(c) = &g.tree.right {
        c.down.write_all(&[REDUCE_TOKEN])?;
    }

    if me == 0 && root != 0 {
        g.relay.hub_down(root).write_all(&acc)?;
    }
    if me == root {
        if me != 0 {
            let mut out = vec![0u8; count];
            g.relay.spoke_down().read_exact(&mut out)?;
            return Ok(Some(out));
        }
        return Ok(Some(acc));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_sum_wraps_modulo_256() {
        let mut acc = vec![200u8, 1, 255];
        ReduceOp::Sum.fold_into(&mut acc, &[100, 2, 1]);
        assert_eq!(acc, vec![44, 3, 0]);
    }

    #[test]
    fn fold_prod_wraps_modulo_256() {
        let mut acc = vec![16u8, 3];
        ReduceOp::Prod.fold_into(&mut acc, &[16, 5]);
        assert_eq!(acc, vec![0, 15]);
    }

    #[test]
    fn fold_min_max() {
        let mut lo = vec![5u8, 200, 7];
        ReduceOp::Min.fold_into(&mut lo, &[9, 100, 7]);
        assert_eq!(lo, vec![5, 100, 7]);

        let mut hi = vec![5u8, 200, 7];
        ReduceOp::Max.fold_into(&mut hi, &[9, 100, 7]);
        assert_eq!(hi, vec![9, 200, 7]);
    }
}
