// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Application packet envelopes.
//!
//! Packets ride verbatim inside information frames. Three kinds exist:
//!
//! # Wire Format
//!
//! ```text
//! START = 0x01 | 0x00 | 4 | filesize (LE u32) | 0x01 | name_len | name*
//! DATA  = 0x02 | seq (n mod 100) | L2 | L1 | fragment (L2*256 + L1 bytes)
//! END   = 0x03 | ...same TLVs as START...
//! ```
//!
//! START and END carry two TLV triplets: file size (type 0, 4-byte
//! little-endian value) and file name (type 1). END metadata is advisory;
//! receivers terminate on the opcode alone. Fragments are capped at
//! [`MAX_FRAGMENT`] bytes.

/// Packet type opcodes.
pub mod packet_type {
    /// Transfer start, carries file metadata.
    pub const START: u8 = 0x01;
    /// File fragment.
    pub const DATA: u8 = 0x02;
    /// Transfer end.
    pub const END: u8 = 0x03;
}

/// TLV field types in START/END packets.
pub mod field_type {
    /// File size, 4-byte little-endian value.
    pub const FILE_SIZE: u8 = 0x00;
    /// File name bytes.
    pub const FILE_NAME: u8 = 0x01;
}

/// Largest fragment carried by one DATA packet.
pub const MAX_FRAGMENT: usize = 3000;

/// Largest file name carried in a control packet.
pub const MAX_NAME_LEN: usize = 255;

/// Error during packet encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Output buffer too small for encoding.
    BufferTooSmall,
    /// Input ends before the packet does.
    Truncated,
    /// First byte is not a known opcode.
    UnknownType(u8),
    /// A TLV field was not where the layout puts it.
    BadField(u8),
    /// Fragment exceeds `MAX_FRAGMENT`.
    FragmentTooLarge,
    /// File name exceeds `MAX_NAME_LEN` bytes.
    NameTooLong,
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small for packet"),
            Self::Truncated => write!(f, "truncated packet"),
            Self::UnknownType(t) => write!(f, "unknown packet type: 0x{:02X}", t),
            Self::BadField(t) => write!(f, "unexpected field type: 0x{:02X}", t),
            Self::FragmentTooLarge => write!(f, "fragment exceeds maximum size"),
            Self::NameTooLong => write!(f, "file name too long"),
        }
    }
}

impl std::error::Error for PacketError {}

/// File metadata announced by START (and echoed by END).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// File size in bytes.
    pub size: u32,
    /// File name as sent by the transmitter.
    pub name: String,
}

impl FileMeta {
    /// Encoded length of a START/END packet carrying this metadata.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        // opcode + (T,L,4-byte size) + (T,L) + name
        1 + 6 + 2 + self.name.len()
    }

    /// Encode as a START packet.
    pub fn encode_start(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        self.encode_control(packet_type::START, buf)
    }

    /// Encode as an END packet.
    pub fn encode_end(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        self.encode_control(packet_type::END, buf)
    }

    fn encode_control(&self, opcode: u8, buf: &mut [u8]) -> Result<usize, PacketError> {
        if self.name.len() > MAX_NAME_LEN {
            return Err(PacketError::NameTooLong);
        }
        if buf.len() < self.encoded_len() {
            return Err(PacketError::BufferTooSmall);
        }

        let mut offset = 0;
        buf[offset] = opcode;
        offset += 1;

        buf[offset] = field_type::FILE_SIZE;
        buf[offset + 1] = 4;
        buf[offset + 2..offset + 6].copy_from_slice(&self.size.to_le_bytes());
        offset += 6;

        buf[offset] = field_type::FILE_NAME;
        buf[offset + 1] = self.name.len() as u8;
        offset += 2;
        buf[offset..offset + self.name.len()].copy_from_slice(self.name.as_bytes());
        offset += self.name.len();

        Ok(offset)
    }

    /// Decode the TLVs following a START/END opcode.
    fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < 6 {
            return Err(PacketError::Truncated);
        }
        if buf[0] != field_type::FILE_SIZE {
            return Err(PacketError::BadField(buf[0]));
        }
        if buf[1] != 4 {
            return Err(PacketError::BadField(buf[0]));
        }
        let size = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);

        let rest = &buf[6..];
        if rest.len() < 2 {
            return Err(PacketError::Truncated);
        }
        if rest[0] != field_type::FILE_NAME {
            return Err(PacketError::BadField(rest[0]));
        }
        let name_len = rest[1] as usize;
        if rest.len() < 2 + name_len {
            return Err(PacketError::Truncated);
        }
        let name = String::from_utf8_lossy(&rest[2..2 + name_len]).into_owned();

        Ok(Self { size, name })
    }
}

/// Encode a DATA packet around `fragment`.
///
/// `seq` is the transmitter's fragment counter modulo 100; receivers treat
/// it as advisory.
pub fn encode_data(seq: u8, fragment: &[u8], buf: &mut [u8]) -> Result<usize, PacketError> {
    if fragment.len() > MAX_FRAGMENT {
        return Err(PacketError::FragmentTooLarge);
    }
    if buf.len() < 4 + fragment.len() {
        return Err(PacketError::BufferTooSmall);
    }

    buf[0] = packet_type::DATA;
    buf[1] = seq;
    buf[2] = (fragment.len() / 256) as u8;
    buf[3] = (fragment.len() % 256) as u8;
    buf[4..4 + fragment.len()].copy_from_slice(fragment);

    Ok(4 + fragment.len())
}

/// A decoded application packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Transfer start with file metadata.
    Start(FileMeta),
    /// One file fragment.
    Data {
        /// Fragment counter modulo 100 (advisory).
        seq: u8,
        /// Fragment bytes.
        fragment: &'a [u8],
    },
    /// Transfer end (metadata advisory).
    End(FileMeta),
}

/// Decode one packet from an information-frame payload.
pub fn decode(buf: &[u8]) -> Result<Packet<'_>, PacketError> {
    let opcode = *buf.first().ok_or(PacketError::Truncated)?;

    match opcode {
        packet_type::START => Ok(Packet::Start(FileMeta::decode(&buf[1..])?)),
        packet_type::END => Ok(Packet::End(FileMeta::decode(&buf[1..])?)),
        packet_type::DATA => {
            if buf.len() < 4 {
                return Err(PacketError::Truncated);
            }
            let seq = buf[1];
            let len = usize::from(buf[2]) * 256 + usize::from(buf[3]);
            if len > MAX_FRAGMENT {
                return Err(PacketError::FragmentTooLarge);
            }
            if buf.len() < 4 + len {
                return Err(PacketError::Truncated);
            }
            Ok(Packet::Data {
                seq,
                fragment: &buf[4..4 + len],
            })
        }
        other => Err(PacketError::UnknownType(other)),
    }
}
