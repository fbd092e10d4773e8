// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// MIMPI: a miniature message-passing runtime for a fixed group of
// cooperating processes, over local UNIX pipes only. The `mimpirun`
// launcher pre-wires a deterministic set of pipe descriptors and forks N
// workers; each worker builds a `Mimpi` runtime offering blocking
// point-to-point send/receive with tags and tree-based barrier, broadcast,
// and reduction.

pub mod chan;
pub mod collective;
pub mod frame;
pub mod inbox;
pub mod launcher;
pub mod layout;
mod reader;
pub mod runtime;
pub mod wiring;

pub use collective::ReduceOp;
pub use frame::{Frame, ANY_TAG, BUFFER_SIZE};
pub use layout::MAX_WORLD_SIZE;
pub use runtime::{Mimpi, MimpiError, MimpiResult};
pub use wiring::{local_world, Wiring};
