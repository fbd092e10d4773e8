// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Launcher wiring: create every pipe in the channel table, relocate the
// ends to their deterministic slots, fork N workers, and wait for all of
// them. Each child publishes its rank under a per-PID key, closes every
// slot it does not own, and execs the worker program; unowned slots must be
// gone before the program runs so EOF semantics are accurate.

use std::collections::HashSet;
use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

use crate::layout::{SlotTable, MAX_WORLD_SIZE};
use crate::runtime::{rank_var, WORLD_SIZE_VAR};

/// Launch `n` copies of `program` with `args`, one per rank. Returns the
/// exit code for the launcher process: 0 only if every child exited 0.
pub fn run(n: usize, program: &str, args: &[String]) -> io::Result<i32> {
    if n == 0 || n > MAX_WORLD_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("world size must be in 1..={MAX_WORLD_SIZE}"),
        ));
    }

    std::env::set_var(WORLD_SIZE_VAR, n.to_string());
    let table = SlotTable::new(n);
    let slots = create_channel_table(&table)?;

    for rank in 0..n {
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            return Err(io::Error::last_os_error());
        }
        if pid == 0 {
            exec_worker(rank, program, args, &table);
        }
    }

    // The launcher keeps no channel ends of its own.
    for slot in &slots {
        unsafe { libc::close(*slot) };
    }

    let mut failed = false;
    for _ in 0..n {
        let mut status: libc::c_int = 0;
        let pid = unsafe { libc::wait(&mut status) };
        if pid <= 0 {
            failed = true;
            continue;
        }
        std::env::remove_var(rank_var(pid as u32));
        if !(libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0) {
            failed = true;
        }
    }
    std::env::remove_var(WORLD_SIZE_VAR);

    Ok(if failed { 1 } else { 0 })
}

/// Create every pipe in the table and relocate both ends to their slots.
/// Returns the full list of relocated descriptors.
fn create_channel_table(table: &SlotTable) -> io::Result<Vec<RawFd>> {
    let mut relocated = Vec::new();
    for (read_slot, write_slot) in table.pipes() {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        relocate(fds[0], read_slot)?;
        relocate(fds[1], write_slot)?;
        relocated.push(read_slot);
        relocated.push(write_slot);
    }
    Ok(relocated)
}

fn relocate(fd: RawFd, slot: RawFd) -> io::Result<()> {
    if fd == slot {
        return Ok(());
    }
    if unsafe { libc::dup2(fd, slot) } == -1 {
        return Err(io::Error::last_os_error());
    }
    unsafe { libc::close(fd) };
    Ok(())
}

fn exec_worker(rank: usize, program: &str, args: &[String], table: &SlotTable) -> ! {
    let pid = unsafe { libc::getpid() } as u32;
    std::env::set_var(rank_var(pid), rank.to_string());

    let owned: HashSet<RawFd> = table.owned_by(rank).into_iter().collect();
    for slot in table.all_slots() {
        if !owned.contains(&slot) {
            unsafe { libc::close(slot) };
        }
    }

    let argv0 = format!("./{}", basename(program));
    let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
    argv.push(cstring_or_die(&argv0));
    for arg in args {
        argv.push(cstring_or_die(arg));
    }
    let mut argv_ptrs: Vec<*const libc::c_char> =
        argv.iter().map(|s| s.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());

    let prog = cstring_or_die(program);
    unsafe { libc::execvp(prog.as_ptr(), argv_ptrs.as_ptr()) };
    eprintln!(
        "mimpirun: exec {program}: {}",
        io::Error::last_os_error()
    );
    unsafe { libc::_exit(127) }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn cstring_or_die(s: &str) -> CString {
    match CString::new(s) {
        Ok(c) => c,
        Err(_) => {
            eprintln!("mimpirun: argument contains an interior NUL: {s:?}");
            unsafe { libc::_exit(127) }
        }
    }
}
