// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Link configuration.

use std::time::Duration;

/// Which side of the transfer this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiates the connection, sends the file, initiates teardown.
    Transmitter,
    /// Accepts the connection, receives the file.
    Receiver,
}

/// Link session configuration.
///
/// # Timing Parameters
///
/// - `timeout`: how long a sent command waits for its answer before the
///   attempt is declared lost
/// - `max_attempts`: how many times the same frame is transmitted before
///   the operation fails
///
/// Worst-case time to declare a dead line = `timeout x max_attempts`.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Endpoint role.
    pub role: Role,
    /// Per-attempt acknowledgement timeout (default: 3 s).
    pub timeout: Duration,
    /// Transmission budget per frame, initial send included (default: 3).
    pub max_attempts: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            role: Role::Transmitter,
            timeout: Duration::from_secs(3),
            max_attempts: 3,
        }
    }
}

impl LinkConfig {
    /// Config for a transmitter endpoint.
    #[must_use]
    pub fn transmitter() -> Self {
        Self {
            role: Role::Transmitter,
            ..Default::default()
        }
    }

    /// Config for a receiver endpoint.
    #[must_use]
    pub fn receiver() -> Self {
        Self {
            role: Role::Receiver,
            ..Default::default()
        }
    }
}
