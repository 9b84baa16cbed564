// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Link session management.
//!
//! A [`LinkSession`] owns the serial port for the lifetime of one
//! connection and drives the stop-and-wait protocol over it:
//!
//! - **open** - SET/UA handshake (transmitter retries, receiver answers)
//! - **write** - one information frame in flight, acknowledged by
//!   `RR(next)`, rejected by `REJ(current)`, retransmitted on timeout
//! - **read** - runs the information parser, answering duplicates and
//!   corrupt payloads, and delivers exactly the in-order payload stream
//! - **close** - DISC/DISC/UA teardown, releasing the port
//!
//! # Lifecycle
//!
//! ```text
//!        open()                  write()/read()              close()
//! port ─────────> LinkSession ────────────────> ... ──────────────> LinkStats
//!                 Ns = Nr = 0    Ns/Nr alternate               port released
//! ```
//!
//! The session is single-threaded: every operation alternates between one
//! bounded byte read and one look at the retransmission deadline, so no
//! call can block past its retry budget. Transient line trouble (timeouts,
//! rejects, bad checks, duplicates, short writes) is absorbed here; only
//! handshake failure, retry exhaustion and I/O loss surface to the caller.

use std::io;

use crate::config::{LinkConfig, Role};

use super::frame::{self, addr, control, max_frame_len, next_seq, FrameError};
use super::information::{InfoEvent, InformationFsm};
use super::port::SerialPort;
use super::retry::AttemptTimer;
use super::supervisory::SupervisoryFsm;

/// Fatal link-layer error.
#[derive(Debug)]
pub enum LinkError {
    /// The serial line failed.
    Io(io::Error),
    /// The SET/UA handshake exhausted its transmission budget.
    HandshakeFailed {
        /// Transmissions performed before giving up.
        attempts: u32,
    },
    /// An acknowledged operation exhausted its transmission budget.
    RetryExhausted {
        /// Transmissions performed before giving up.
        attempts: u32,
    },
    /// The payload could not be framed.
    Frame(FrameError),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "serial line error: {e}"),
            Self::HandshakeFailed { attempts } => {
                write!(f, "handshake failed after {attempts} attempts")
            }
            Self::RetryExhausted { attempts } => {
                write!(f, "retry budget exhausted after {attempts} attempts")
            }
            Self::Frame(e) => write!(f, "framing error: {e}"),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Frame(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LinkError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

/// Session counters.
#[derive(Debug, Default, Clone)]
pub struct LinkStats {
    /// Information frames successfully sent or delivered.
    pub frames: u64,
    /// Frames sent again after a timeout or reject.
    pub retransmissions: u64,
    /// Acknowledgement waits that expired.
    pub timeouts: u64,
    /// REJ frames sent (receive side).
    pub rejects_sent: u64,
    /// REJ frames received (transmit side).
    pub rejects_received: u64,
    /// Duplicate information frames re-acknowledged without delivery.
    pub duplicates_reacked: u64,
}

/// Outcome of a bounded supervisory wait.
enum Wait {
    Matched((u8, u8)),
    TimedOut,
}

/// One endpoint of an established link.
pub struct LinkSession {
    port: Box<dyn SerialPort>,
    config: LinkConfig,
    /// Next sequence to send (transmitter).
    ns: u8,
    /// Next sequence expected (receiver).
    nr: u8,
    timer: AttemptTimer,
    stats: LinkStats,
}

impl LinkSession {
    /// Establish a link over `port`.
    ///
    /// The transmitter sends SET and waits for UA, retrying up to the
    /// configured budget; the receiver blocks until a SET arrives and
    /// answers with UA.
    ///
    /// # Errors
    ///
    /// [`LinkError::HandshakeFailed`] when the transmitter's budget runs
    /// out, [`LinkError::Io`] when the line dies.
    pub fn open(port: Box<dyn SerialPort>, config: LinkConfig) -> Result<Self, LinkError> {
        let mut session = Self {
            port,
            config,
            ns: 0,
            nr: 0,
            timer: AttemptTimer::new(),
            stats: LinkStats::default(),
        };

        match session.config.role {
            Role::Transmitter => session.connect_tx()?,
            Role::Receiver => session.connect_rx()?,
        }

        Ok(session)
    }

    /// Session counters so far.
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Configured role.
    pub fn role(&self) -> Role {
        self.config.role
    }

    fn connect_tx(&mut self) -> Result<(), LinkError> {
        self.timer.reset();
        while !self.timer.exhausted(self.config.max_attempts) {
            if self.timer.attempts() > 0 {
                self.stats.retransmissions += 1;
            }
            self.send_supervisory(addr::TX, control::SET)?;
            self.timer.arm(self.config.timeout);

            match self.await_supervisory(&[(addr::RX, control::UA)], true)? {
                Wait::Matched(_) => {
                    self.timer.disarm();
                    log::info!("link established (transmitter)");
                    return Ok(());
                }
                Wait::TimedOut => {
                    self.stats.timeouts += 1;
                    log::debug!("SET unanswered (attempt {})", self.timer.attempts());
                }
            }
        }

        log::warn!(
            "handshake failed after {} attempts",
            self.timer.attempts()
        );
        Err(LinkError::HandshakeFailed {
            attempts: self.timer.attempts(),
        })
    }

    fn connect_rx(&mut self) -> Result<(), LinkError> {
        loop {
            if let Wait::Matched(_) =
                self.await_supervisory(&[(addr::TX, control::SET)], false)?
            {
                break;
            }
        }
        self.send_supervisory(addr::RX, control::UA)?;
        log::info!("link established (receiver)");
        Ok(())
    }

    /// Send one payload as an information frame and wait for its
    /// acknowledgement.
    ///
    /// Returns the payload length once `RR(next)` arrives. A `REJ` triggers
    /// an immediate retransmission, a timeout a retransmission after the
    /// configured wait; both consume one transmission from the budget.
    ///
    /// # Errors
    ///
    /// [`LinkError::RetryExhausted`] when the budget runs out,
    /// [`LinkError::Frame`] for oversized payloads, [`LinkError::Io`] when
    /// the line dies.
    pub fn write(&mut self, payload: &[u8]) -> Result<usize, LinkError> {
        let mut frame_buf = vec![0u8; max_frame_len(payload.len())];
        let wire_len = frame::encode_information(self.ns, payload, &mut frame_buf)?;

        let ack = control::rr(next_seq(self.ns));
        let nak = control::rej(self.ns);
        let accepts = [(addr::TX, ack), (addr::TX, nak)];

        self.timer.reset();
        while !self.timer.exhausted(self.config.max_attempts) {
            if self.timer.attempts() > 0 {
                self.stats.retransmissions += 1;
            }
            self.write_wire(&frame_buf[..wire_len])?;
            self.timer.arm(self.config.timeout);

            match self.await_supervisory(&accepts, true)? {
                Wait::Matched((_, c)) if c == ack => {
                    self.timer.disarm();
                    self.stats.frames += 1;
                    self.ns = next_seq(self.ns);
                    return Ok(payload.len());
                }
                Wait::Matched(_) => {
                    self.stats.rejects_received += 1;
                    log::debug!("I({}) rejected, retransmitting", self.ns);
                }
                Wait::TimedOut => {
                    self.stats.timeouts += 1;
                    log::debug!(
                        "I({}) unacknowledged (attempt {})",
                        self.ns,
                        self.timer.attempts()
                    );
                }
            }
        }

        log::warn!(
            "giving up on I({}) after {} attempts",
            self.ns,
            self.timer.attempts()
        );
        Err(LinkError::RetryExhausted {
            attempts: self.timer.attempts(),
        })
    }

    /// Receive the next in-order payload.
    ///
    /// Corrupt frames are rejected, duplicates re-acknowledged and a
    /// repeated handshake request re-answered, all without returning;
    /// only a verified, first-time payload comes back.
    ///
    /// # Errors
    ///
    /// [`LinkError::Io`] when the line dies.
    pub fn read(&mut self) -> Result<Vec<u8>, LinkError> {
        let mut fsm = InformationFsm::new(self.nr);

        loop {
            let byte = match self.port.read_byte()? {
                Some(b) => b,
                None => continue,
            };

            match fsm.on_byte(byte) {
                InfoEvent::Continue => {}
                InfoEvent::Reply { address, ctrl } => {
                    if control::is_rej(ctrl) {
                        self.stats.rejects_sent += 1;
                        log::debug!("payload check failed, sending REJ({})", self.nr);
                    } else if control::is_rr(ctrl) {
                        self.stats.duplicates_reacked += 1;
                        log::debug!("duplicate I-frame, re-sending RR({})", self.nr);
                    } else {
                        log::debug!("peer repeated SET, re-sending UA");
                    }
                    self.send_supervisory(address, ctrl)?;
                }
                InfoEvent::Delivered => {
                    let payload = fsm.take_payload();
                    self.nr = next_seq(self.nr);
                    self.send_supervisory(addr::TX, control::rr(self.nr))?;
                    self.stats.frames += 1;
                    return Ok(payload);
                }
            }
        }
    }

    /// Tear the link down and release the port.
    ///
    /// The transmitter sends DISC, waits for the peer's DISC and answers
    /// with the final UA; the receiver waits for DISC, sends its own and
    /// waits for the UA (re-answering a repeated peer DISC along the way).
    ///
    /// # Errors
    ///
    /// [`LinkError::RetryExhausted`] when a teardown wait runs out of
    /// budget, [`LinkError::Io`] when the line dies.
    pub fn close(mut self) -> Result<LinkStats, LinkError> {
        match self.config.role {
            Role::Transmitter => self.close_tx()?,
            Role::Receiver => self.close_rx()?,
        }

        log::info!(
            "link closed: {} frames, {} retransmissions, {} timeouts",
            self.stats.frames,
            self.stats.retransmissions,
            self.stats.timeouts
        );
        Ok(self.stats)
    }

    fn close_tx(&mut self) -> Result<(), LinkError> {
        self.timer.reset();
        while !self.timer.exhausted(self.config.max_attempts) {
            if self.timer.attempts() > 0 {
                self.stats.retransmissions += 1;
            }
            self.send_supervisory(addr::TX, control::DISC)?;
            self.timer.arm(self.config.timeout);

            match self.await_supervisory(&[(addr::RX, control::DISC)], true)? {
                Wait::Matched(_) => {
                    self.timer.disarm();
                    self.send_supervisory(addr::RX, control::UA)?;
                    log::info!("disconnected (transmitter)");
                    return Ok(());
                }
                Wait::TimedOut => {
                    self.stats.timeouts += 1;
                }
            }
        }

        Err(LinkError::RetryExhausted {
            attempts: self.timer.attempts(),
        })
    }

    fn close_rx(&mut self) -> Result<(), LinkError> {
        // The peer initiates teardown; nothing to retransmit while waiting.
        loop {
            if let Wait::Matched(_) =
                self.await_supervisory(&[(addr::TX, control::DISC)], false)?
            {
                break;
            }
        }

        let accepts = [(addr::RX, control::UA), (addr::TX, control::DISC)];

        self.timer.reset();
        while !self.timer.exhausted(self.config.max_attempts) {
            if self.timer.attempts() > 0 {
                self.stats.retransmissions += 1;
            }
            self.send_supervisory(addr::RX, control::DISC)?;
            self.timer.arm(self.config.timeout);

            loop {
                match self.await_supervisory(&accepts, true)? {
                    Wait::Matched((_, c)) if c == control::UA => {
                        self.timer.disarm();
                        log::info!("disconnected (receiver)");
                        return Ok(());
                    }
                    Wait::Matched(_) => {
                        // The peer never saw our DISC and re-sent its own:
                        // answer again without consuming an attempt.
                        self.stats.retransmissions += 1;
                        self.send_supervisory(addr::RX, control::DISC)?;
                        self.timer.rearm(self.config.timeout);
                    }
                    Wait::TimedOut => {
                        self.stats.timeouts += 1;
                        break;
                    }
                }
            }
        }

        Err(LinkError::RetryExhausted {
            attempts: self.timer.attempts(),
        })
    }

    fn send_supervisory(&mut self, address: u8, ctrl: u8) -> Result<(), LinkError> {
        let mut buf = [0u8; max_frame_len(0)];
        let n = frame::encode_supervisory(address, ctrl, &mut buf)?;
        self.write_wire(&buf[..n])
    }

    /// Write a complete frame, retrying short writes in place.
    fn write_wire(&mut self, wire: &[u8]) -> Result<(), LinkError> {
        let mut offset = 0;
        while offset < wire.len() {
            let n = self.port.write(&wire[offset..])?;
            if n == 0 {
                return Err(LinkError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "serial port accepted no bytes",
                )));
            }
            offset += n;
        }
        Ok(())
    }

    /// Read bytes through a supervisory parser until it matches or, when
    /// `bounded`, the retransmission deadline passes.
    fn await_supervisory(
        &mut self,
        accepts: &[(u8, u8)],
        bounded: bool,
    ) -> Result<Wait, LinkError> {
        let mut fsm = SupervisoryFsm::new(accepts);
        loop {
            if bounded && self.timer.expired() {
                return Ok(Wait::TimedOut);
            }
            if let Some(byte) = self.port.read_byte()? {
                if let Some(matched) = fsm.on_byte(byte) {
                    return Ok(Wait::Matched(matched));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::port::PipePort;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn tx_config(timeout_ms: u64, attempts: u32) -> LinkConfig {
        LinkConfig {
            role: Role::Transmitter,
            timeout: Duration::from_millis(timeout_ms),
            max_attempts: attempts,
        }
    }

    #[test]
    fn test_open_handshake() {
        let (tx_port, rx_port) = PipePort::pair();

        let rx = std::thread::spawn(move || {
            LinkSession::open(Box::new(rx_port), LinkConfig::receiver()).expect("rx open")
        });

        let tx_session =
            LinkSession::open(Box::new(tx_port), tx_config(500, 3)).expect("tx open");
        let rx_session = rx.join().expect("rx thread");

        assert_eq!(tx_session.role(), Role::Transmitter);
        assert_eq!(rx_session.role(), Role::Receiver);
    }

    #[test]
    fn test_write_read_and_close() {
        let (tx_port, rx_port) = PipePort::pair();

        let rx = std::thread::spawn(move || {
            let mut session =
                LinkSession::open(Box::new(rx_port), LinkConfig::receiver()).expect("rx open");
            let payload = session.read().expect("read");
            let stats = session.close().expect("rx close");
            (payload, stats)
        });

        let mut tx_session =
            LinkSession::open(Box::new(tx_port), tx_config(500, 3)).expect("tx open");
        let n = tx_session.write(&[0xAA, 0xBB, 0xCC]).expect("write");
        assert_eq!(n, 3);

        let tx_stats = tx_session.close().expect("tx close");
        let (payload, rx_stats) = rx.join().expect("rx thread");

        assert_eq!(payload, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(tx_stats.frames, 1);
        assert_eq!(rx_stats.frames, 1);
        assert_eq!(tx_stats.retransmissions, 0);
        assert_eq!(rx_stats.rejects_sent, 0);
    }

    #[test]
    fn test_sequence_alternates_across_writes() {
        let (tx_port, rx_port) = PipePort::pair();

        let rx = std::thread::spawn(move || {
            let mut session =
                LinkSession::open(Box::new(rx_port), LinkConfig::receiver()).expect("rx open");
            let a = session.read().expect("read a");
            let b = session.read().expect("read b");
            let c = session.read().expect("read c");
            let stats = session.close().expect("rx close");
            (a, b, c, stats)
        });

        let mut tx_session =
            LinkSession::open(Box::new(tx_port), tx_config(500, 3)).expect("tx open");
        tx_session.write(b"one").expect("write one");
        tx_session.write(b"two").expect("write two");
        tx_session.write(b"three").expect("write three");
        let tx_stats = tx_session.close().expect("tx close");

        let (a, b, c, rx_stats) = rx.join().expect("rx thread");
        assert_eq!(a, b"one");
        assert_eq!(b, b"two");
        assert_eq!(c, b"three");
        assert_eq!(tx_stats.frames, 3);
        assert_eq!(rx_stats.frames, 3);
    }

    #[test]
    fn test_write_exhausts_on_silent_peer() {
        let (tx_port, rx_port) = PipePort::pair();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        // The receiver opens the link, then goes silent while staying alive.
        let rx = std::thread::spawn(move || {
            let session =
                LinkSession::open(Box::new(rx_port), LinkConfig::receiver()).expect("rx open");
            done_rx.recv().ok();
            drop(session);
        });

        let mut tx_session =
            LinkSession::open(Box::new(tx_port), tx_config(30, 2)).expect("tx open");

        match tx_session.write(&[0x01]) {
            Err(LinkError::RetryExhausted { attempts }) => assert_eq!(attempts, 2),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(tx_session.stats().timeouts, 2);
        assert_eq!(tx_session.stats().retransmissions, 1);

        done_tx.send(()).ok();
        rx.join().expect("rx thread");
    }

    #[test]
    fn test_handshake_exhausts_on_dead_line() {
        let (tx_port, mut peer) = PipePort::pair();

        let started = Instant::now();
        let result = LinkSession::open(Box::new(tx_port), tx_config(20, 3));
        let elapsed = started.elapsed();

        match result {
            Err(LinkError::HandshakeFailed { attempts }) => assert_eq!(attempts, 3),
            Err(other) => panic!("expected HandshakeFailed, got {other:?}"),
            Ok(_) => panic!("expected HandshakeFailed, got an open session"),
        }
        // Attempts are spaced by the per-attempt timeout.
        assert!(elapsed >= Duration::from_millis(60));

        // Exactly three SET frames reached the wire.
        let mut seen = Vec::new();
        while let Ok(Some(byte)) = peer.read_byte() {
            seen.push(byte);
        }
        assert_eq!(seen.len(), 15);
        assert_eq!(&seen[..5], &[0x7E, 0x03, 0x03, 0x00, 0x7E]);
    }

    #[test]
    fn test_io_error_surfaces() {
        let (tx_port, rx_port) = PipePort::pair();
        drop(rx_port);

        match LinkSession::open(Box::new(tx_port), tx_config(100, 3)) {
            Err(LinkError::Io(_)) => {}
            Err(other) => panic!("expected Io error, got {other:?}"),
            Ok(_) => panic!("expected Io error, got an open session"),
        }
    }
}
