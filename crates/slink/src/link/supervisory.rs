// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Supervisory-frame parser.
//!
//! Parses flag-delimited 5-byte supervisory frames (SET, UA, DISC, RR, REJ)
//! one byte at a time against a set of accepted `(address, control)` pairs.
//!
//! # State Machine
//!
//! ```text
//! START ──FLAG──> FLAG_OK ──A──> A_OK ──C──> C_OK ──A^C──> BCC_OK ──FLAG──> accept
//!   ^                |             |           |              |
//!   |                |(FLAG: stay) |(FLAG)     |(FLAG)        |
//!   +──── other ─────+─────────────+───────────+──────────────+
//! ```
//!
//! A mid-frame `FLAG` re-synchronizes to `FLAG_OK`; any other unexpected
//! byte returns to `START`. The accept-set form covers every wait the
//! session performs: a single expected frame, the write-acknowledge wait
//! (`RR(next)` vs `REJ(current)`), and the extended close-side wait where
//! either a peer `DISC` command or a final `UA` reply may arrive — the
//! two-address close branch falls out of remembering which address matched.
//!
//! The parser does no I/O and has no notion of time; the caller owns the
//! read loop and the retry deadline.

use super::frame::FLAG;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    FlagOk,
    AddrOk,
    CtrlOk,
    BccOk,
}

/// Byte-at-a-time supervisory frame parser.
#[derive(Debug)]
pub struct SupervisoryFsm<'a> {
    accepts: &'a [(u8, u8)],
    state: State,
    address: u8,
    ctrl: u8,
}

impl<'a> SupervisoryFsm<'a> {
    /// Create a parser accepting any of the given `(address, control)` pairs.
    #[must_use]
    pub fn new(accepts: &'a [(u8, u8)]) -> Self {
        Self {
            accepts,
            state: State::Start,
            address: 0,
            ctrl: 0,
        }
    }

    /// Discard partial progress and return to the hunting state.
    pub fn reset(&mut self) {
        self.state = State::Start;
    }

    /// Feed one byte.
    ///
    /// Returns the matched `(address, control)` pair when a complete, valid
    /// frame from the accept set has been seen; the parser then resets
    /// itself and can be reused.
    pub fn on_byte(&mut self, byte: u8) -> Option<(u8, u8)> {
        match self.state {
            State::Start => {
                if byte == FLAG {
                    self.state = State::FlagOk;
                }
            }
            State::FlagOk => {
                if self.accepts.iter().any(|&(a, _)| a == byte) {
                    self.address = byte;
                    self.state = State::AddrOk;
                } else if byte != FLAG {
                    self.state = State::Start;
                }
            }
            State::AddrOk => {
                if byte == FLAG {
                    self.state = State::FlagOk;
                } else if self
                    .accepts
                    .iter()
                    .any(|&(a, c)| a == self.address && c == byte)
                {
                    self.ctrl = byte;
                    self.state = State::CtrlOk;
                } else {
                    self.state = State::Start;
                }
            }
            State::CtrlOk => {
                if byte == FLAG {
                    self.state = State::FlagOk;
                } else if byte == (self.address ^ self.ctrl) {
                    self.state = State::BccOk;
                } else {
                    self.state = State::Start;
                }
            }
            State::BccOk => {
                if byte == FLAG {
                    self.state = State::Start;
                    return Some((self.address, self.ctrl));
                }
                self.state = State::Start;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::frame::{addr, control, encode_supervisory};

    fn feed(fsm: &mut SupervisoryFsm<'_>, bytes: &[u8]) -> Option<(u8, u8)> {
        for &b in bytes {
            if let Some(m) = fsm.on_byte(b) {
                return Some(m);
            }
        }
        None
    }

    fn frame_of(a: u8, c: u8) -> Vec<u8> {
        let mut buf = [0u8; 16];
        let n = encode_supervisory(a, c, &mut buf).expect("encode");
        buf[..n].to_vec()
    }

    #[test]
    fn test_accepts_expected_frame() {
        let accepts = [(addr::RX, control::UA)];
        let mut fsm = SupervisoryFsm::new(&accepts);

        let m = feed(&mut fsm, &frame_of(addr::RX, control::UA));
        assert_eq!(m, Some((addr::RX, control::UA)));
    }

    #[test]
    fn test_ignores_garbage_prefix() {
        let accepts = [(addr::TX, control::SET)];
        let mut fsm = SupervisoryFsm::new(&accepts);

        let mut bytes = vec![0x00, 0x42, 0xFF, 0x7D];
        bytes.extend(frame_of(addr::TX, control::SET));
        assert_eq!(feed(&mut fsm, &bytes), Some((addr::TX, control::SET)));
    }

    #[test]
    fn test_flag_resync_mid_frame() {
        let accepts = [(addr::TX, control::DISC)];
        let mut fsm = SupervisoryFsm::new(&accepts);

        // Truncated frame, then a fresh complete one starting at its FLAG.
        let mut bytes = vec![FLAG, addr::TX, control::DISC];
        bytes.extend(frame_of(addr::TX, control::DISC));
        assert_eq!(feed(&mut fsm, &bytes), Some((addr::TX, control::DISC)));
    }

    #[test]
    fn test_bad_bcc_restarts() {
        let accepts = [(addr::RX, control::UA)];
        let mut fsm = SupervisoryFsm::new(&accepts);

        let bad = [FLAG, addr::RX, control::UA, 0x00, FLAG];
        assert_eq!(feed(&mut fsm, &bad), None);

        // A subsequent valid frame is still accepted.
        assert_eq!(
            feed(&mut fsm, &frame_of(addr::RX, control::UA)),
            Some((addr::RX, control::UA))
        );
    }

    #[test]
    fn test_write_ack_set_distinguishes_rr_and_rej() {
        let accepts = [(addr::TX, control::rr(1)), (addr::TX, control::rej(0))];

        let mut fsm = SupervisoryFsm::new(&accepts);
        assert_eq!(
            feed(&mut fsm, &frame_of(addr::TX, control::rr(1))),
            Some((addr::TX, control::rr(1)))
        );

        let mut fsm = SupervisoryFsm::new(&accepts);
        assert_eq!(
            feed(&mut fsm, &frame_of(addr::TX, control::rej(0))),
            Some((addr::TX, control::rej(0)))
        );

        // The stale acknowledgement RR(0) is not in the set and is ignored.
        let mut fsm = SupervisoryFsm::new(&accepts);
        assert_eq!(feed(&mut fsm, &frame_of(addr::TX, control::rr(0))), None);
    }

    #[test]
    fn test_close_set_tracks_address_per_branch() {
        // Receiver-side close wait: either the peer repeats its DISC command
        // or answers our DISC with the final UA.
        let accepts = [(addr::TX, control::DISC), (addr::RX, control::UA)];

        let mut fsm = SupervisoryFsm::new(&accepts);
        assert_eq!(
            feed(&mut fsm, &frame_of(addr::RX, control::UA)),
            Some((addr::RX, control::UA))
        );

        let mut fsm = SupervisoryFsm::new(&accepts);
        assert_eq!(
            feed(&mut fsm, &frame_of(addr::TX, control::DISC)),
            Some((addr::TX, control::DISC))
        );

        // Cross pairings must not match: (TX, UA) pairs UA with the wrong
        // address for this wait.
        let mut fsm = SupervisoryFsm::new(&accepts);
        assert_eq!(feed(&mut fsm, &frame_of(addr::TX, control::UA)), None);
    }

    #[test]
    fn test_repeated_flags_tolerated() {
        let accepts = [(addr::TX, control::SET)];
        let mut fsm = SupervisoryFsm::new(&accepts);

        let mut bytes = vec![FLAG, FLAG, FLAG];
        bytes.extend(frame_of(addr::TX, control::SET));
        assert_eq!(feed(&mut fsm, &bytes), Some((addr::TX, control::SET)));
    }

    #[test]
    fn test_reusable_after_accept() {
        let accepts = [(addr::TX, control::SET)];
        let mut fsm = SupervisoryFsm::new(&accepts);

        let frame = frame_of(addr::TX, control::SET);
        assert!(feed(&mut fsm, &frame).is_some());
        assert!(feed(&mut fsm, &frame).is_some());
    }

    #[test]
    fn test_reset_discards_progress() {
        let accepts = [(addr::TX, control::SET)];
        let mut fsm = SupervisoryFsm::new(&accepts);

        // Partial header, then reset: the tail alone must not complete.
        feed(&mut fsm, &[FLAG, addr::TX, control::SET]);
        fsm.reset();
        assert_eq!(feed(&mut fsm, &[0x00, FLAG]), None);
    }
}
