// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable stop-and-wait link layer for a point-to-point serial line.
//!
//! # Wire Protocol
//!
//! ```text
//! Supervisory = FLAG | A | C | BCC1 | FLAG                      (5 bytes)
//! Information = FLAG | A | C | BCC1 | payload* | BCC2 | FLAG    (stuffed)
//! ```
//!
//! - `FLAG = 0x7E` delimits frames; `BCC1 = A ^ C`, `BCC2 = XOR(payload)`
//! - content bytes equal to `0x7E`/`0x7D` travel as `0x7D, byte ^ 0x20`
//! - one information frame is in flight per direction; the alternating
//!   sequence bit in `C` pairs each `I` frame with its `RR`/`REJ` answer
//!
//! # Modules
//!
//! - `frame` - constants, byte stuffing, frame encoders
//! - `supervisory` - 5-byte control frame parser
//! - `information` - information frame parser with inline destuffing
//! - `retry` - retransmission deadline and attempt budget
//! - `port` - serial port trait, in-memory pipe, impairment wrapper
//! - `tty` - raw-mode serial device
//! - `session` - open / write / read / close orchestration

pub mod frame;
pub mod information;
pub mod port;
pub mod retry;
pub mod session;
pub mod supervisory;
pub mod tty;

// Re-exports
pub use frame::{FrameError, MAX_PAYLOAD};
pub use information::{InfoEvent, InformationFsm};
pub use port::{PipePort, SerialPort, SimConfig, SimPort, SimStats};
pub use retry::AttemptTimer;
pub use session::{LinkError, LinkSession, LinkStats};
pub use supervisory::SupervisoryFsm;
pub use tty::TtyPort;
