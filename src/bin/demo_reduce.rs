// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reduction worker for any world size. Run with:
//   mimpirun 4 demo_reduce
//
// Every rank contributes a buffer of `rank + 1` bytes repeated COUNT
// times; rank 0 verifies the element-wise SUM (modulo 256) and every rank
// checks the broadcast of the verdict.

use std::process::exit;

use mimpi::{Mimpi, ReduceOp};

const COUNT: usize = 8;

fn main() {
    let mut mpi = Mimpi::init(false).expect("init");
    let n = mpi.world_size();
    let rank = mpi.world_rank();

    let contribution = vec![(rank + 1) as u8; COUNT];
    let result = mpi
        .reduce(&contribution, ReduceOp::Sum, 0)
        .expect("reduce");

    let mut verdict = [0u8; 1];
    if rank == 0 {
        let expected = ((n * (n + 1) / 2) % 256) as u8;
        let sum = result.expect("root gets the reduction");
        println!("rank 0: sum {sum:?}, expected {expected} per element");
        verdict[0] = u8::from(sum == vec![expected; COUNT]);
    }
    mpi.bcast(&mut verdict, 0).expect("bcast verdict");

    mpi.barrier().expect("barrier");
    mpi.finalize();
    exit(if verdict[0] == 1 { 0 } else { 1 });
}
