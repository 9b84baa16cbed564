// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-file transfer flows.
//!
//! The transmitter announces the file with START, streams it as DATA
//! fragments of at most [`MAX_FRAGMENT`](super::packet::MAX_FRAGMENT)
//! bytes, marks the end with END and tears the link down. The receiver
//! mirrors that: it ignores traffic until START, writes fragments to disk
//! strictly in arrival order, stops at END and completes the teardown.
//!
//! The link layer below already guarantees ordering, dedup and integrity,
//! so these flows carry no acknowledgement logic of their own.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::link::session::{LinkError, LinkSession, LinkStats};

use super::packet::{self, decode, encode_data, FileMeta, Packet, PacketError, MAX_FRAGMENT};

/// Error during a file transfer.
#[derive(Debug)]
pub enum TransferError {
    /// Local file system failure.
    Io(io::Error),
    /// The link gave up.
    Link(LinkError),
    /// A delivered payload was not a valid packet.
    Packet(PacketError),
    /// The file cannot be described by the protocol (too big, bad name).
    Unrepresentable(&'static str),
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "file I/O error: {e}"),
            Self::Link(e) => write!(f, "link error: {e}"),
            Self::Packet(e) => write!(f, "malformed packet: {e}"),
            Self::Unrepresentable(what) => write!(f, "cannot transfer: {what}"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Link(e) => Some(e),
            Self::Packet(e) => Some(e),
            Self::Unrepresentable(_) => None,
        }
    }
}

impl From<io::Error> for TransferError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<LinkError> for TransferError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<PacketError> for TransferError {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

/// What a completed transfer did.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    /// File name on the wire.
    pub file_name: String,
    /// Path of the file read or written locally.
    pub path: PathBuf,
    /// Payload bytes moved (file contents only).
    pub bytes: u64,
    /// DATA packets exchanged.
    pub fragments: u64,
    /// Link-layer counters for the session.
    pub link: LinkStats,
}

/// Send the regular file at `path` over an established transmitter session.
///
/// Consumes the session: a successful return means the peer acknowledged
/// every fragment and the teardown completed.
pub fn send_file(mut session: LinkSession, path: &Path) -> Result<TransferSummary, TransferError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(TransferError::Unrepresentable("file name is not valid UTF-8"))?
        .to_string();
    if name.len() > packet::MAX_NAME_LEN {
        return Err(TransferError::Unrepresentable("file name too long"));
    }

    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let size = u32::try_from(size)
        .map_err(|_| TransferError::Unrepresentable("file larger than 4 GiB"))?;

    let meta = FileMeta {
        size,
        name: name.clone(),
    };

    log::info!("sending {:?} ({} bytes)", name, size);

    let mut ctrl_buf = [0u8; 2 + 8 + packet::MAX_NAME_LEN];
    let n = meta.encode_start(&mut ctrl_buf)?;
    session.write(&ctrl_buf[..n])?;

    let mut fragment = [0u8; MAX_FRAGMENT];
    let mut data_buf = [0u8; 4 + MAX_FRAGMENT];
    let mut fragments = 0u64;
    let mut bytes = 0u64;

    loop {
        let read = file.read(&mut fragment)?;
        if read == 0 {
            break;
        }

        let seq = (fragments % 100) as u8;
        let n = encode_data(seq, &fragment[..read], &mut data_buf)?;
        session.write(&data_buf[..n])?;

        fragments += 1;
        bytes += read as u64;
        log::debug!("fragment {} sent ({} bytes)", fragments, read);
    }

    let n = meta.encode_end(&mut ctrl_buf)?;
    session.write(&ctrl_buf[..n])?;

    let link = session.close()?;
    log::info!("sent {:?}: {} bytes in {} fragments", name, bytes, fragments);

    Ok(TransferSummary {
        file_name: name,
        path: path.to_path_buf(),
        bytes,
        fragments,
        link,
    })
}

/// Receive one file over an established receiver session, creating it
/// under `out_dir`.
///
/// The file is created at the announced name (base name only, so a peer
/// cannot steer the write outside `out_dir`) with owner-read permission
/// and written strictly in arrival order.
pub fn receive_file(
    mut session: LinkSession,
    out_dir: &Path,
) -> Result<TransferSummary, TransferError> {
    // Ignore anything that is not the transfer start.
    let meta = loop {
        let payload = session.read()?;
        match decode(&payload) {
            Ok(Packet::Start(meta)) => break meta,
            Ok(other) => log::warn!("ignoring packet before START: {other:?}"),
            Err(e) => log::warn!("ignoring undecodable payload before START: {e}"),
        }
    };

    let file_name = Path::new(&meta.name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("received.bin")
        .to_string();
    let path = out_dir.join(&file_name);

    log::info!(
        "receiving {:?} ({} bytes announced) into {:?}",
        meta.name,
        meta.size,
        path
    );

    let mut file = create_owner_read(&path)?;
    let mut bytes = 0u64;
    let mut fragments = 0u64;

    loop {
        let payload = session.read()?;
        match decode(&payload)? {
            Packet::Data { seq, fragment } => {
                let expected = (fragments % 100) as u8;
                if seq != expected {
                    log::debug!("fragment sequence {} (expected {})", seq, expected);
                }
                file.write_all(fragment)?;
                bytes += fragment.len() as u64;
                fragments += 1;
            }
            Packet::End(_) => break,
            Packet::Start(_) => log::warn!("ignoring repeated START"),
        }
    }
    file.flush()?;
    drop(file);

    if bytes != u64::from(meta.size) {
        log::warn!(
            "received {} bytes but {} were announced",
            bytes,
            meta.size
        );
    }

    let link = session.close()?;
    log::info!(
        "received {:?}: {} bytes in {} fragments",
        file_name,
        bytes,
        fragments
    );

    Ok(TransferSummary {
        file_name: meta.name,
        path,
        bytes,
        fragments,
        link,
    })
}

#[cfg(unix)]
fn create_owner_read(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o400)
        .open(path)
}

#[cfg(not(unix))]
fn create_owner_read(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_paths() {
        // Path handling only; the full flows are covered by the
        // integration suite.
        let name = Path::new("/tmp/dir/../evil")
            .file_name()
            .and_then(|n| n.to_str());
        assert_eq!(name, Some("evil"));

        let name = Path::new("../../etc/passwd").file_name().and_then(|n| n.to_str());
        assert_eq!(name, Some("passwd"));
    }
}
