//! Outbound queue with adaptive pacing.
//!
//! Realm servers disconnect clients that send bursts, so queued chat commands
//! leave one at a time. The wait before the next send grows with the size of
//! the last packet and with a penalty that builds while the queue stays busy.
//!
//! | last packet | base wait |
//! |-------------|-----------|
//! | < 10 bytes  | 1300 ms   |
//! | < 30 bytes  | 3400 ms   |
//! | < 50 bytes  | 3600 ms   |
//! | < 100 bytes | 3900 ms   |
//! | otherwise   | 5500 ms   |
//!
//! Each penalty step adds 60 ms. The penalty goes up by one per send and drops
//! back to zero once it reaches 100 or a send happens more than 500 ms after
//! its window opened.

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::packet::Packet;
use crate::error::QueueError;

/// Queue depth at which new commands are shed.
pub const MAX_QUEUED: usize = 10;

/// Queue depth above which the queue is reported as congested.
pub const WARN_DEPTH: usize = 7;

const PENALTY_STEP_MS: u64 = 60;
const PENALTY_CAP: u32 = 100;
const PENALTY_GRACE_MS: u64 = 500;

/// Base wait after sending a packet of `last_len` bytes.
pub fn base_wait_ms(last_len: usize) -> u64 {
    match last_len {
        0..=9 => 1300,
        10..=29 => 3400,
        30..=49 => 3600,
        50..=99 => 3900,
        _ => 5500,
    }
}

/// Cuts `command` to at most `limit` bytes without splitting a character.
pub fn truncate_command(command: &str, limit: usize) -> &str {
    if command.len() <= limit {
        return command;
    }
    let mut end = limit;
    while !command.is_char_boundary(end) {
        end -= 1;
    }
    &command[..end]
}

/// An encoded packet waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEntry {
    pub bytes: Bytes,
}

impl OutboundEntry {
    pub fn new(packet: &Packet) -> Self {
        Self {
            bytes: packet.to_bytes(),
        }
    }

    /// On-wire length used for pacing.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug)]
pub struct OutboundThrottle {
    queue: VecDeque<OutboundEntry>,
    last_sent_ms: u64,
    last_sent_len: usize,
    penalty: u32,
}

impl OutboundThrottle {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::with_capacity(MAX_QUEUED),
            last_sent_ms: 0,
            last_sent_len: 0,
            penalty: 0,
        }
    }

    /// Starts the first wait window at `now_ms`, typically on connect.
    pub fn start(&mut self, now_ms: u64) {
        self.last_sent_ms = now_ms;
    }

    /// Current wait between sends.
    pub fn wait_ms(&self) -> u64 {
        base_wait_ms(self.last_sent_len) + u64::from(self.penalty) * PENALTY_STEP_MS
    }

    pub fn penalty(&self) -> u32 {
        self.penalty
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queues an entry, shedding it when [`MAX_QUEUED`] entries are already waiting.
    ///
    /// Returns the queue depth after the push.
    pub fn push(&mut self, entry: OutboundEntry) -> Result<usize, QueueError> {
        if self.queue.len() >= MAX_QUEUED {
            return Err(QueueError::Overflow {
                depth: self.queue.len(),
            });
        }
        self.queue.push_back(entry);
        let depth = self.queue.len();
        if depth > WARN_DEPTH {
            warn!(depth, "outbound queue congested");
        }
        Ok(depth)
    }

    /// Pops the next entry if its wait window has elapsed.
    pub fn poll_send(&mut self, now_ms: u64) -> Option<OutboundEntry> {
        if self.queue.is_empty() {
            return None;
        }

        let wait = self.wait_ms();
        if now_ms.saturating_sub(self.last_sent_ms) < wait {
            return None;
        }

        if self.queue.len() > WARN_DEPTH {
            warn!(depth = self.queue.len(), "packets waiting to be sent");
        }

        let entry = self.queue.pop_front()?;
        self.last_sent_len = entry.len();

        if self.penalty >= PENALTY_CAP || now_ms > self.last_sent_ms + wait + PENALTY_GRACE_MS {
            self.penalty = 0;
        } else {
            self.penalty += 1;
        }
        self.last_sent_ms = now_ms;

        debug!(len = entry.len(), penalty = self.penalty, "outbound packet released");
        Some(entry)
    }

    /// Discards everything queued and returns how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

impl Default for OutboundThrottle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(len: usize) -> OutboundEntry {
        OutboundEntry {
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn test_base_wait_steps() {
        let waits: Vec<u64> = [5, 25, 45, 90, 150].iter().map(|&n| base_wait_ms(n)).collect();
        assert_eq!(waits, vec![1300, 3400, 3600, 3900, 5500]);
        assert_eq!(base_wait_ms(9), 1300);
        assert_eq!(base_wait_ms(10), 3400);
        assert_eq!(base_wait_ms(100), 5500);
    }

    #[test]
    fn test_holds_until_window_elapses() {
        let mut throttle = OutboundThrottle::new();
        throttle.start(10_000);
        throttle.push(entry(20)).unwrap();
        assert!(throttle.poll_send(11_299).is_none());
        assert_eq!(throttle.poll_send(11_300).map(|e| e.len()), Some(20));
        // next window is sized after the 20 byte packet plus one penalty step
        assert_eq!(throttle.wait_ms(), 3400 + 60);
    }

    #[test]
    fn test_penalty_resets_after_idle_gap() {
        let mut throttle = OutboundThrottle::new();
        throttle.start(0);
        throttle.push(entry(5)).unwrap();
        throttle.push(entry(5)).unwrap();
        throttle.poll_send(1300).unwrap();
        assert_eq!(throttle.penalty(), 1);
        // window is 1360, grace ends at 1300 + 1360 + 500
        throttle.poll_send(1300 + 1360 + 501).unwrap();
        assert_eq!(throttle.penalty(), 0);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate_command("hello", 10), "hello");
        assert_eq!(truncate_command("hello", 3), "hel");
        assert_eq!(truncate_command("héllo", 2), "h");
    }
}
