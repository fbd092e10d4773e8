// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Framed transport for point-to-point channels: a frame is a 4-byte count,
// the payload in fragments of at most BUFFER_SIZE bytes, then a 4-byte tag.
// The channel is single-producer/single-consumer, so the length prefix is
// the only delimiter needed.

use crate::chan::{Chan, ReadAbort, RemoteClosed, StopToken};

/// Fragment size for payload transfers.
pub const BUFFER_SIZE: usize = 4096;

/// Receive-side wildcard: matches any tag.
pub const ANY_TAG: i32 = 0;

/// One received message: payload plus its tag. The count of the frame is
/// the payload length.
#[derive(Debug)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub tag: i32,
}

impl Frame {
    pub fn count(&self) -> u32 {
        self.payload.len() as u32
    }

    /// The receive matching rule: exact count, and either an exact tag or
    /// the wildcard.
    pub fn matches(&self, count: u32, tag: i32) -> bool {
        self.count() == count && (tag == ANY_TAG || self.tag == tag)
    }
}

/// Write one frame to the channel. `RemoteClosed` as soon as any segment
/// hits a broken pipe.
pub fn send_frame(chan: &Chan, payload: &[u8], tag: i32) -> Result<(), RemoteClosed> {
    assert!(
        payload.len() <= u32::MAX as usize,
        "payload does not fit a frame header"
    );
    let count = payload.len() as u32;
    chan.write_all(&count.to_ne_bytes())?;
    for chunk in payload.chunks(BUFFER_SIZE) {
        chan.write_all(chunk)?;
    }
    chan.write_all(&tag.to_ne_bytes())?;
    Ok(())
}

/// Read one frame off the channel, interruptible at every segment via the
/// stop token.
pub fn recv_frame(chan: &Chan, stop: &StopToken) -> Result<Frame, ReadAbort> {
    let mut header = [0u8; 4];
    chan.read_exact_interruptible(&mut header, stop)?;
    let count = u32::from_ne_bytes(header) as usize;

    let mut payload = vec![0u8; count];
    let mut done = 0;
    while done < count {
        let take = (count - done).min(BUFFER_SIZE);
        chan.read_exact_interruptible(&mut payload[done..done + take], stop)?;
        done += take;
    }

    let mut tag = [0u8; 4];
    chan.read_exact_interruptible(&mut tag, stop)?;
    Ok(Frame {
        payload,
        tag: i32::from_ne_bytes(tag),
    })
}
