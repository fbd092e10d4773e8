// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Two-rank ping/pong worker. Run with:
//   mimpirun 2 demo_ping
//
// Rank 0 sends a tagged payload to rank 1, which replies with the bytes
// reversed under a different tag. Both ranks verify what they received and
// exit non-zero on any mismatch.

use std::process::exit;

use mimpi::Mimpi;

const PING: &[u8] = &[42, 17, 3];
const PONG: &[u8] = &[3, 17, 42];
const PING_TAG: i32 = 7;
const PONG_TAG: i32 = 8;

fn main() {
    let mut mpi = Mimpi::init(false).expect("init");
    if mpi.world_size() != 2 {
        eprintln!("demo_ping needs a world of exactly 2");
        exit(1);
    }

    let ok = match mpi.world_rank() {
        0 => {
            mpi.send(PING, 1, PING_TAG).expect("send ping");
            let mut reply = [0u8; 3];
            mpi.recv(&mut reply, 1, PONG_TAG).expect("recv pong");
            println!("rank 0: pong {reply:?}");
            reply == *PONG
        }
        _ => {
            let mut ping = [0u8; 3];
            mpi.recv(&mut ping, 0, PING_TAG).expect("recv ping");
            println!("rank 1: ping {ping:?}");
            let mut reply = ping.to_vec();
            reply.reverse();
            mpi.send(&reply, 0, PONG_TAG).expect("send pong");
            ping == *PING
        }
    };

    mpi.barrier().expect("barrier");
    mpi.finalize();
    exit(if ok { 0 } else { 1 });
}
