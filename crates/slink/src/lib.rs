// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # slink - stop-and-wait serial link with single-file transfer
//!
//! A two-layer protocol stack for shipping one file between two endpoints
//! joined by an asynchronous serial line:
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     Application Layer                        |
//! |      START / DATA / END packets, file metadata, fragments    |
//! +--------------------------------------------------------------+
//! |                        Link Layer                            |
//! |  framing + byte stuffing | BCC checks | stop-and-wait ARQ    |
//! |  alternating-bit seq     | retransmit | SET/UA, DISC teardown|
//! +--------------------------------------------------------------+
//! |                       Serial Port                            |
//! |        raw 8-N-1 byte pipe (tty, in-memory, simulated)       |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use slink::{LinkConfig, LinkSession, TtyPort};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = TtyPort::open("/dev/ttyS0", 9600)?;
//!     let mut link = LinkSession::open(Box::new(port), LinkConfig::transmitter())?;
//!
//!     link.write(b"hello over the wire")?;
//!
//!     let stats = link.close()?;
//!     println!("sent {} frames", stats.frames);
//!     Ok(())
//! }
//! ```
//!
//! The receive side mirrors this with [`LinkConfig::receiver`] and
//! [`LinkSession::read`]. Whole-file transfer, including metadata and
//! fragmentation, lives in [`app`]: [`app::send_file`] and
//! [`app::receive_file`].
//!
//! ## Guarantees
//!
//! - payloads arrive exactly once, in order, or the session errors out
//! - a corrupted frame is never delivered (XOR block checks, rejected and
//!   retransmitted)
//! - every wait is bounded by `timeout x max_attempts`
//!
//! ## Non-goals
//!
//! Sliding windows, parameter negotiation, authentication, encryption and
//! multi-file sessions are out of scope; the link moves one file per
//! connection, one frame in flight.

/// Application layer: file-transfer packets and flows.
pub mod app;
/// Link configuration (role, timing, retry budget).
pub mod config;
/// Link layer: framing, parsers, ARQ, session management.
pub mod link;

// Re-exports
pub use app::{receive_file, send_file, TransferError, TransferSummary};
pub use config::{LinkConfig, Role};
pub use link::{
    LinkError, LinkSession, LinkStats, PipePort, SerialPort, SimConfig, SimPort, TtyPort,
};
