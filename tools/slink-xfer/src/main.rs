// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! slink-xfer - ship one file across a serial line
//!
//! Run the receiver first, then the transmitter on the other end of the
//! wire:
//!
//! ```text
//! slink-xfer /dev/ttyS1 rx .
//! slink-xfer /dev/ttyS0 tx penguin.gif
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use colored::*;
use slink::{receive_file, send_file, LinkConfig, LinkSession, Role, TransferSummary, TtyPort};

/// Serial file transfer over a stop-and-wait link
#[derive(Parser, Debug)]
#[command(name = "slink-xfer")]
#[command(version)]
#[command(about = "Send or receive one file over a serial line")]
struct Args {
    /// Serial device path (e.g. /dev/ttyS0)
    port: String,

    /// Endpoint role: tx sends, rx receives
    role: RoleArg,

    /// File to send (tx) or directory to receive into (rx)
    file: PathBuf,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    baud: u32,

    /// Transmission budget per frame, first send included
    #[arg(short, long, default_value = "3")]
    retries: u32,

    /// Per-attempt acknowledgement timeout in seconds
    #[arg(short, long, default_value = "3")]
    timeout: u64,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum RoleArg {
    /// Transmitter
    Tx,
    /// Receiver
    Rx,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Tx => Role::Transmitter,
            RoleArg::Rx => Role::Receiver,
        }
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let port = TtyPort::open(&args.port, args.baud)?;

    let config = LinkConfig {
        role: args.role.into(),
        timeout: Duration::from_secs(args.timeout),
        max_attempts: args.retries,
    };

    let session = LinkSession::open(Box::new(port), config)?;

    let summary = match args.role {
        RoleArg::Tx => send_file(session, &args.file)?,
        RoleArg::Rx => receive_file(session, &args.file)?,
    };

    print_summary(args.role, &summary);
    Ok(())
}

fn print_summary(role: RoleArg, summary: &TransferSummary) {
    let verb = match role {
        RoleArg::Tx => "Sent",
        RoleArg::Rx => "Received",
    };

    println!(
        "{} {} ({} bytes, {} fragments)",
        verb.green().bold(),
        display_path(&summary.path),
        summary.bytes,
        summary.fragments
    );
    println!(
        "  frames: {}  retransmissions: {}  timeouts: {}",
        summary.link.frames, summary.link.retransmissions, summary.link.timeouts
    );
    if summary.link.rejects_sent + summary.link.rejects_received + summary.link.duplicates_reacked
        > 0
    {
        println!(
            "  rejects sent/received: {}/{}  duplicates re-acked: {}",
            summary.link.rejects_sent,
            summary.link.rejects_received,
            summary.link.duplicates_reacked
        );
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
