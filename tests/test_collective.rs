// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tree collectives over in-process worlds: barrier synchronization,
// broadcast from arbitrary roots, reductions, and fault propagation.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mimpi::{local_world, Mimpi, MimpiError, ReduceOp};

/// Run one closure per rank, each on its own thread with its own runtime,
/// and collect the per-rank results in rank order.
fn run_world<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize, &mut Mimpi) -> T + Send + Sync + 'static,
{
    let wirings = local_world(size).expect("wiring");
    let f = Arc::new(f);
    let mut handles = Vec::new();
    for (rank, wiring) in wirings.into_iter().enumerate() {
        let f = Arc::clone(&f);
        handles.push(thread::spawn(move || {
            let mut mpi = Mimpi::with_wiring(rank, size, wiring, false).expect("init");
            let out = (*f)(rank, &mut mpi);
            mpi.finalize();
            out
        }));
    }
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn barrier_holds_every_rank_until_all_arrive() {
    let stamps: Arc<Mutex<Vec<(Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
    let stamps2 = Arc::clone(&stamps);

    run_world(4, move |rank, mpi| {
        // Stagger the entries so a broken barrier would be caught.
        thread::sleep(Duration::from_millis(30 * rank as u64));
        let entry = Instant::now();
        mpi.barrier().expect("barrier");
        let exit = Instant::now();
        stamps2.lock().unwrap().push((entry, exit));
    });

    let stamps = stamps.lock().unwrap();
    assert_eq!(stamps.len(), 4);
    for &(_, exit) in stamps.iter() {
        for &(entry, _) in stamps.iter() {
            assert!(exit >= entry, "a rank left the barrier before another entered");
        }
    }
}

#[test]
fn barrier_with_one_rank_returns_immediately() {
    run_world(1, |_, mpi| mpi.barrier().expect("barrier"));
}

#[test]
fn broadcast_from_nonzero_root() {
    let buffers = run_world(4, |rank, mpi| {
        let mut data = if rank == 2 { [9u8, 9, 9, 9] } else { [0u8; 4] };
        mpi.bcast(&mut data, 2).expect("bcast");
        data
    });
    for data in buffers {
        assert_eq!(data, [9, 9, 9, 9]);
    }
}

#[test]
fn broadcast_from_rank_zero() {
    let buffers = run_world(5, |rank, mpi| {
        let mut data = if rank == 0 { [1u8, 2, 3] } else { [0u8; 3] };
        mpi.bcast(&mut data, 0).expect("bcast");
        data
    });
    for data in buffers {
        assert_eq!(data, [1, 2, 3]);
    }
}

#[test]
fn reduce_sum_and_prod_at_rank_zero() {
    let sums = run_world(3, |rank, mpi| {
        mpi.reduce(&[(rank + 1) as u8], ReduceOp::Sum, 0).expect("reduce")
    });
    assert_eq!(sums[0], Some(vec![6]));
    assert_eq!(sums[1], None);
    assert_eq!(sums[2], None);

    let prods = run_world(3, |rank, mpi| {
        mpi.reduce(&[(rank + 1) as u8], ReduceOp::Prod, 0).expect("reduce")
    });
    assert_eq!(prods[0], Some(vec![6]));
}

#[test]
fn reduce_sum_wraps_modulo_256() {
    let values = [200u8, 100, 60];
    let results = run_world(3, move |rank, mpi| {
        mpi.reduce(&[values[rank]], ReduceOp::Sum, 0).expect("reduce")
    });
    assert_eq!(results[0], Some(vec![104]));
}

#[test]
fn reduce_min_max_vectors() {
    let mins = run_world(3, |rank, mpi| {
        let data = [(rank * 10) as u8, 255 - rank as u8];
        mpi.reduce(&data, ReduceOp::Min, 0).expect("reduce")
    });
    assert_eq!(mins[0], Some(vec![0, 253]));

    let maxs = run_world(3, |rank, mpi| {
        let data = [(rank * 10) as u8, 255 - rank as u8];
        mpi.reduce(&data, ReduceOp::Max, 0).expect("reduce")
    });
    assert_eq!(maxs[0], Some(vec![20, 255]));
}

#[test]
fn reduce_to_nonzero_root() {
    let results = run_world(4, |rank, mpi| {
        mpi.reduce(&[(rank + 1) as u8], ReduceOp::Sum, 2).expect("reduce")
    });
    assert_eq!(results[2], Some(vec![10]));
    for (rank, result) in results.into_iter().enumerate() {
        if rank != 2 {
            assert_eq!(result, None);
        }
    }
}

#[test]
fn reduce_alone_returns_own_data() {
    let results = run_world(1, |_, mpi| {
        mpi.reduce(&[7, 8], ReduceOp::Max, 0).expect("reduce")
    });
    assert_eq!(results[0], Some(vec![7, 8]));
}

#[test]
fn zero_count_collectives_still_synchronize() {
    let results = run_world(2, |_, mpi| {
        let mut empty = [0u8; 0];
        mpi.bcast(&mut empty, 1).expect("bcast");
        mpi.reduce(&[], ReduceOp::Sum, 0).expect("reduce")
    });
    assert_eq!(results[0], Some(vec![]));
    assert_eq!(results[1], None);
}

#[test]
fn invalid_root_is_rejected_before_io() {
    let results = run_world(2, |_, mpi| {
        let mut data = [0u8; 1];
        let bcast = mpi.bcast(&mut data, 5);
        let reduce = mpi.reduce(&data, ReduceOp::Sum, 9).map(|_| ());
        (bcast, reduce)
    });
    for (bcast, reduce) in results {
        assert_eq!(bcast, Err(MimpiError::NoSuchRank));
        assert_eq!(reduce, Err(MimpiError::NoSuchRank));
    }
}

#[test]
fn one_dead_rank_fails_the_barrier_everywhere() {
    let mut wirings = local_world(4).expect("wiring");
    // Rank 0 never takes part: its bundle is dropped up front, so every
    // survivor's barrier must fail rather than hang.
    let survivors: Vec<_> = wirings.drain(1..).collect();
    drop(wirings);

    let mut handles = Vec::new();
    for (idx, wiring) in survivors.into_iter().enumerate() {
        let rank = idx + 1;
        handles.push(thread::spawn(move || {
            let mut mpi = Mimpi::with_wiring(rank, 4, wiring, false).expect("init");
            let out = mpi.barrier();
            mpi.finalize();
            out
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Err(MimpiError::RemoteFinished));
    }
}
