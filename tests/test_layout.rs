// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The descriptor-slot table is a contract between the launcher and every
// worker: slots must be unique, never touch stdio, and partition cleanly
// into per-rank ownership sets.

use std::collections::HashSet;

use mimpi::layout::{SlotTable, MAX_WORLD_SIZE};

#[test]
fn created_slots_are_unique() {
    for n in 1..=MAX_WORLD_SIZE {
        let table = SlotTable::new(n);
        let slots = table.all_slots();
        let unique: HashSet<_> = slots.iter().copied().collect();
        assert_eq!(unique.len(), slots.len(), "duplicate slot for n={n}");
    }
}

#[test]
fn slots_stay_clear_of_stdio() {
    for n in 1..=MAX_WORLD_SIZE {
        let table = SlotTable::new(n);
        for slot in table.all_slots() {
            assert!(slot >= 20, "slot {slot} too low for n={n}");
        }
    }
}

#[test]
fn ownership_sets_are_disjoint() {
    for n in 1..=MAX_WORLD_SIZE {
        let table = SlotTable::new(n);
        let mut seen: HashSet<i32> = HashSet::new();
        for rank in 0..n {
            for slot in table.owned_by(rank) {
                assert!(
                    seen.insert(slot),
                    "slot {slot} owned by two ranks for n={n}"
                );
            }
        }
    }
}

#[test]
fn owned_slots_were_created() {
    for n in 1..=MAX_WORLD_SIZE {
        let table = SlotTable::new(n);
        let created: HashSet<_> = table.all_slots().into_iter().collect();
        for rank in 0..n {
            for slot in table.owned_by(rank) {
                assert!(
                    created.contains(&slot),
                    "rank {rank} owns uncreated slot {slot} for n={n}"
                );
            }
        }
    }
}

#[test]
fn every_pipe_end_lands_in_exactly_one_slot() {
    let table = SlotTable::new(5);
    // 5 ranks: 20 ordered pairs, 4 tree pipes per rank, 4 relay pipes.
    assert_eq!(table.pipes().len(), 20 + 5 * 4 + 4 * 2);
}
