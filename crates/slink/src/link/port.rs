// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial port abstraction.
//!
//! The link layer consumes a byte-granular, blocking-with-bounded-wait
//! serial device through the [`SerialPort`] trait:
//!
//! - `read_byte` returns `Ok(Some(b))` when a byte arrived, `Ok(None)` when
//!   none did within the port's internal wait. The wait MUST be bounded and
//!   short relative to the link's per-attempt timeout, so the parse loops
//!   can notice an expired retransmission deadline between reads.
//! - `write` may accept fewer bytes than offered; the caller retries the
//!   remainder in place.
//!
//! # Implementations
//!
//! - [`TtyPort`](super::tty::TtyPort) - a real serial device in raw 8-N-1
//!   mode
//! - [`PipePort`] - in-memory duplex pair for tests and local loopback
//! - [`SimPort`] - wrapper injecting byte loss and corruption

use std::io;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

/// Byte-oriented serial line.
pub trait SerialPort: Send {
    /// Read one byte, waiting at most the port's bounded internal interval.
    ///
    /// # Returns
    /// * `Ok(Some(byte))` - a byte was delivered
    /// * `Ok(None)` - no data arrived within the wait
    /// * `Err` - the line is gone
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write up to `buf.len()` bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

// ============================================================================
// PipePort - in-memory duplex byte pipe
// ============================================================================

/// One end of an in-memory serial line.
///
/// Bytes written to one end arrive, in order, at the other. Used by the
/// test suites to wire two sessions together without hardware.
pub struct PipePort {
    tx: Sender<u8>,
    rx: Receiver<u8>,
    poll: Duration,
}

impl PipePort {
    /// Create a connected pair of ports.
    #[must_use]
    pub fn pair() -> (PipePort, PipePort) {
        let (a_tx, a_rx) = channel::unbounded();
        let (b_tx, b_rx) = channel::unbounded();
        (
            PipePort {
                tx: a_tx,
                rx: b_rx,
                poll: Duration::from_millis(1),
            },
            PipePort {
                tx: b_tx,
                rx: a_rx,
                poll: Duration::from_millis(1),
            },
        )
    }

    /// Adjust the bounded read wait.
    pub fn set_poll_interval(&mut self, poll: Duration) {
        self.poll = poll;
    }
}

impl SerialPort for PipePort {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.rx.recv_timeout(self.poll) {
            Ok(b) => Ok(Some(b)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer end of pipe closed",
            )),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &b in buf {
            if self.tx.send(b).is_err() {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "peer end of pipe closed",
                ));
            }
        }
        Ok(buf.len())
    }
}

// ============================================================================
// SimPort - impairment wrapper
// ============================================================================

/// Impairment configuration for [`SimPort`].
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Per-byte loss probability (0.0 - 1.0) on the write path.
    pub loss_rate: f64,
    /// Per-byte single-bit corruption probability (0.0 - 1.0) on the write
    /// path.
    pub corruption_rate: f64,
    /// Largest chunk accepted per `write` call (0 = unlimited); smaller
    /// values force short writes.
    pub max_write_chunk: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corruption_rate: 0.0,
            max_write_chunk: 0,
        }
    }
}

/// Statistics collected by [`SimPort`].
#[derive(Debug, Default, Clone)]
pub struct SimStats {
    /// Bytes offered to the underlying port.
    pub bytes_sent: u64,
    /// Bytes silently dropped.
    pub bytes_dropped: u64,
    /// Bytes with a flipped bit.
    pub bytes_corrupted: u64,
}

/// Serial port wrapper with seeded, reproducible impairments.
///
/// Loss and corruption apply per byte on the write path, which is how a
/// noisy serial line actually fails: a damaged byte inside a frame breaks
/// BCC2, a lost one breaks framing, and the retransmission machinery has to
/// recover either way.
pub struct SimPort<P: SerialPort> {
    inner: P,
    config: SimConfig,
    rng_state: u64,
    stats: SimStats,
}

impl<P: SerialPort> SimPort<P> {
    /// Wrap `inner` with the given impairments.
    pub fn new(inner: P, config: SimConfig) -> Self {
        Self {
            inner,
            config,
            rng_state: 0x12345678_9ABCDEF0,
            stats: SimStats::default(),
        }
    }

    /// Set the random seed for reproducible runs.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng_state = seed;
    }

    /// Get impairment statistics.
    pub fn stats(&self) -> SimStats {
        self.stats.clone()
    }

    fn rand_u64(&mut self) -> u64 {
        // xorshift64
        let mut state = self.rng_state;
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rng_state = state;
        state
    }

    fn rand_f64(&mut self) -> f64 {
        (self.rand_u64() as f64) / (u64::MAX as f64)
    }
}

impl<P: SerialPort> SerialPort for SimPort<P> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.inner.read_byte()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let accepted = if self.config.max_write_chunk > 0 {
            buf.len().min(self.config.max_write_chunk)
        } else {
            buf.len()
        };

        for &b in &buf[..accepted] {
            self.stats.bytes_sent += 1;

            if self.config.loss_rate > 0.0 && self.rand_f64() < self.config.loss_rate {
                self.stats.bytes_dropped += 1;
                continue;
            }

            let mut byte = b;
            if self.config.corruption_rate > 0.0 && self.rand_f64() < self.config.corruption_rate {
                byte ^= 1u8 << (self.rand_u64() % 8);
                self.stats.bytes_corrupted += 1;
            }

            let one = [byte];
            while self.inner.write(&one)? == 0 {}
        }

        Ok(accepted)
    }
}
