// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Byte channel over a UNIX pipe endpoint.
// One `Chan` owns exactly one descriptor (read end or write end) and closes
// it on drop. Reads and writes are full-transfer: `write_all` loops until
// every byte is in the pipe, `read_exact` loops until the buffer is full.
// The only non-fatal failure is the remote end being gone (EOF on read,
// EPIPE on write); any other syscall failure is retried once and then
// aborts the process with a diagnostic.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::sync::Once;

/// The other end of the channel is gone: EOF on a read, broken pipe on a
/// write. Every surviving channel failure maps to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteClosed;

/// Why an interruptible read returned without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAbort {
    /// The remote end closed the channel.
    Closed,
    /// The stop token was raised (runtime finalize).
    Cancelled,
}

/// Print a diagnostic and terminate. Second-failure policy for syscalls
/// that are not allowed to fail twice.
pub(crate) fn sys_fatal(what: &str, err: io::Error) -> ! {
    eprintln!("ERROR: {what} failed twice: {err}");
    std::process::exit(1);
}

/// Ignore SIGPIPE process-wide so writes to a dead peer surface as EPIPE
/// instead of killing the process. Idempotent.
pub(crate) fn ignore_sigpipe() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    });
}

// ---------------------------------------------------------------------------
// Chan
// ---------------------------------------------------------------------------

/// One end of a unidirectional pipe.
pub struct Chan {
    fd: RawFd,
}

// Safety: a Chan is just a descriptor; the kernel serialises pipe I/O.
unsafe impl Send for Chan {}
unsafe impl Sync for Chan {}

impl Chan {
    /// Create a pipe and return `(read end, write end)`.
    pub fn pair() -> io::Result<(Chan, Chan)> {
        let mut fds = [0 as libc::c_int; 2];
        let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok((Chan { fd: fds[0] }, Chan { fd: fds[1] }))
    }

    /// Adopt an inherited descriptor slot (see `layout`). The returned
    /// channel owns the descriptor and closes it on drop.
    pub fn from_slot(slot: RawFd) -> Chan {
        Chan { fd: slot }
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }

    fn read_once(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::read(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn write_once(&self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::write(
                self.fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )
        };
        if n == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    /// Blocking read. Returns the number of bytes read (> 0), or
    /// `RemoteClosed` on EOF.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, RemoteClosed> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read_once(buf) {
            Ok(0) => Err(RemoteClosed),
            Ok(n) => Ok(n),
            Err(_) => match self.read_once(buf) {
                Ok(0) => Err(RemoteClosed),
                Ok(n) => Ok(n),
                Err(e) => sys_fatal("read on channel", e),
            },
        }
    }

    /// Read until `buf` is full. `RemoteClosed` if EOF arrives first.
    pub fn read_exact(&self, buf: &mut [u8]) -> Result<(), RemoteClosed> {
        let mut done = 0;
        while done < buf.len() {
            done += self.read(&mut buf[done..])?;
        }
        Ok(())
    }

    /// Write the whole buffer. `RemoteClosed` if the read end is gone.
    pub fn write_all(&self, mut buf: &[u8]) -> Result<(), RemoteClosed> {
        while !buf.is_empty() {
            match self.write_once(buf) {
                Ok(n) => buf = &buf[n..],
                Err(e) if e.raw_os_error() == Some(libc::EPIPE) => {
                    return Err(RemoteClosed)
                }
                Err(_) => match self.write_once(buf) {
                    Ok(n) => buf = &buf[n..],
                    Err(e) if e.raw_os_error() == Some(libc::EPIPE) => {
                        return Err(RemoteClosed)
                    }
                    Err(e) => sys_fatal("write on channel", e),
                },
            }
        }
        Ok(())
    }

    /// Block until this channel has data or the stop token is raised, then
    /// read. Reader threads use this at every suspension point so finalize
    /// can cancel them mid-read.
    pub fn read_interruptible(
        &self,
        buf: &mut [u8],
        stop: &StopToken,
    ) -> Result<usize, ReadAbort> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.wait_readable(stop)?;
        self.read(buf).map_err(|RemoteClosed| ReadAbort::Closed)
    }

    /// `read_exact` built on `read_interruptible`.
    pub fn read_exact_interruptible(
        &self,
        buf: &mut [u8],
        stop: &StopToken,
    ) -> Result<(), ReadAbort> {
        let mut done = 0;
        while done < buf.len() {
            done += self.read_interruptible(&mut buf[done..], stop)?;
        }
        Ok(())
    }

    fn wait_readable(&self, stop: &StopToken) -> Result<(), ReadAbort> {
        let wake = libc::POLLIN | libc::POLLHUP | libc::POLLERR;
        loop {
            let mut fds = [
                libc::pollfd {
                    fd: self.fd,
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: stop.rx.fd,
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), 2, -1) };
            if rc == -1 {
                let rc2 = unsafe { libc::poll(fds.as_mut_ptr(), 2, -1) };
                if rc2 == -1 {
                    sys_fatal("poll on channel", io::Error::last_os_error());
                }
            }
            if fds[1].revents & wake != 0 {
                return Err(ReadAbort::Cancelled);
            }
            if fds[0].revents & wake != 0 {
                return Ok(());
            }
        }
    }
}

impl Drop for Chan {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl std::fmt::Debug for Chan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chan").field("fd", &self.fd).finish()
    }
}

// ---------------------------------------------------------------------------
// Stop tokens: self-pipe cancellation for the reader pool
// ---------------------------------------------------------------------------

/// Read side of the stop pipe, shared by every reader thread of a runtime.
/// Never consumed, only polled: one raise wakes every reader.
pub struct StopToken {
    rx: Chan,
}

impl StopToken {
    pub fn raw_fd(&self) -> RawFd {
        self.rx.raw_fd()
    }
}

/// Write side of the stop pipe. Raising it writes one byte and closes the
/// end, leaving the token permanently readable.
pub struct StopSignal {
    tx: Chan,
}

impl StopSignal {
    pub fn raise(self) {
        let _ = self.tx.write_all(&[1]);
    }
}

/// Create a stop pipe for one runtime's reader pool.
pub fn stop_pair() -> io::Result<(StopSignal, Arc<StopToken>)> {
    let (rx, tx) = Chan::pair()?;
    Ok((StopSignal { tx }, Arc::new(StopToken { rx })))
}
