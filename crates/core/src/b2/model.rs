//! Frame structure and the framing constants.

use crate::b2f::Proposal;
use crate::{Error, Result};

/// Start-of-header byte opening every frame.
pub const SOH: u8 = 0x01;
/// Start-of-text byte opening every data block.
pub const STX: u8 = 0x02;
/// End-of-transmission byte closing the block list.
pub const EOT: u8 = 0x04;
/// Field terminator inside the prologue.
pub const NUL: u8 = 0x00;

/// A full data block carries exactly this many bytes; the final block of a
/// frame may carry fewer.
pub const MAX_BLOCK: u8 = 250;

/// Number of lead bytes sent ahead of the blocks when a transfer resumes at
/// a non-zero offset.
pub const LEAD_BYTES: usize = 6;

/// One B2 frame, reassembled from its on-wire blocks.
///
/// `compressed` is the full compressed image, including the codec's 6-byte
/// preamble (2 checksum bytes followed by the little-endian uncompressed
/// length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct B2Frame {
    /// Subject text from the frame prologue.
    pub subject: String,
    /// Resume offset (ASCII decimal on the wire); 0 for a fresh transfer.
    pub offset: u32,
    /// Reassembled compressed image.
    pub compressed: Vec<u8>,
    /// Trailing checksum byte as transmitted.
    pub checksum: u8,
}

impl B2Frame {
    /// Additive checksum over the reassembled compressed bytes:
    /// `((-sum) & 0xFF)`.
    pub fn calculate_checksum(data: &[u8]) -> u8 {
        data.iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b))
            .wrapping_neg()
    }

    /// Uncompressed length embedded in the codec preamble, if the image is
    /// long enough to carry one.
    pub fn embedded_len(&self) -> Option<u32> {
        self.compressed
            .get(2..6)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Cross-validates the reassembled image against the governing proposal.
    pub fn validate(&self, proposal: &Proposal) -> Result<()> {
        if self.compressed.len() != proposal.compressed_size as usize {
            return Err(Error::SizeMismatch {
                what: "compressed image",
                expected: proposal.compressed_size as usize,
                actual: self.compressed.len(),
            });
        }
        match self.embedded_len() {
            Some(len) if len == proposal.uncompressed_size => Ok(()),
            Some(len) => Err(Error::SizeMismatch {
                what: "uncompressed image",
                expected: proposal.uncompressed_size as usize,
                actual: len as usize,
            }),
            None => Err(Error::Format("codec preamble")),
        }
    }
}
