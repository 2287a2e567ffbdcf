//! The LZHUF codec: LZSS over a 4 KiB window combined with adaptive
//! Huffman coding, as used for the compressed image inside B2 frames.
//!
//! On the wire the compressed image starts with a 6-byte preamble: two
//! legacy checksum bytes followed by the uncompressed length as a
//! little-endian `u32`. The session engine only depends on the [`Codec`]
//! trait, so tests can swap in doubles without touching real compression.

mod bitio;
mod huffman;
mod lzss;

use crate::{Error, Result};

/// Sliding window size.
const N: usize = 4096;
/// Lookahead buffer size, which is also the maximum match length.
const F: usize = 60;
/// Matches this short are cheaper to send as literals.
const THRESHOLD: usize = 2;

/// Length of the image preamble: 2 checksum bytes plus the little-endian
/// uncompressed length.
pub const PREAMBLE: usize = 6;

/// Decompression seam used by the session engine.
pub trait Codec: Send + Sync {
    /// Expands a full compressed image (preamble included) back to the
    /// original bytes.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

impl<T: Codec + ?Sized> Codec for std::sync::Arc<T> {
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).decompress(data)
    }
}

/// The Winlink LZHUF codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lzhuf;

impl Lzhuf {
    /// Compresses `data` into a preamble-prefixed LZHUF image.
    pub fn compress(&self, data: &[u8]) -> Vec<u8> {
        let stream = lzss::encode(data);
        let mut image = Vec::with_capacity(PREAMBLE + stream.len());
        image.extend_from_slice(&[0, 0]);
        image.extend_from_slice(&(data.len() as u32).to_le_bytes());
        image.extend_from_slice(&stream);
        let crc = crc16(&image[2..]);
        image[0] = (crc & 0xff) as u8;
        image[1] = (crc >> 8) as u8;
        image
    }
}

impl Codec for Lzhuf {
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < PREAMBLE {
            return Err(Error::Decompress("image shorter than preamble"));
        }
        // Bytes [0..2) are the legacy checksum. Transport integrity is
        // already guarded by the frame trailer, so they are not validated
        // on inbound images.
        let expected = u32::from_le_bytes([data[2], data[3], data[4], data[5]]) as usize;
        lzss::decode(&data[PREAMBLE..], expected).map_err(Error::Decompress)
    }
}

/// CCITT CRC-16 (poly 0x1021, init 0) over the length field and code
/// stream, emitted into the preamble of outbound images.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    fn roundtrip(data: &[u8]) {
        let image = Lzhuf.compress(data);
        assert_eq!(
            u32::from_le_bytes([image[2], image[3], image[4], image[5]]) as usize,
            data.len()
        );
        assert_eq!(Lzhuf.decompress(&image).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_ascii_message() {
        roundtrip(b"Date: 2025/08/08 20:40\r\nFrom: W6XYZ\r\nTo: BOB\r\n\r\nhello winlink\r\n");
    }

    #[test]
    fn test_roundtrip_empty() {
        roundtrip(b"");
    }

    #[test]
    fn test_roundtrip_random_binary() {
        let mut data = vec![0u8; 8192];
        StdRng::seed_from_u64(0x5EED).fill_bytes(&mut data);
        roundtrip(&data);
    }

    #[test]
    fn test_repetitive_text_compresses() {
        let data = b"QST QST QST de AREDN_BRIDGE ".repeat(100);
        let image = Lzhuf.compress(&data);
        assert!(image.len() < data.len() / 2);
        assert_eq!(Lzhuf.decompress(&image).unwrap(), data);
    }

    #[test]
    fn test_short_image_rejected() {
        assert_matches!(Lzhuf.decompress(&[0, 0, 4]), Err(Error::Decompress(_)));
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let image = Lzhuf.compress(b"a payload long enough that truncation breaks decoding");
        assert_matches!(
            Lzhuf.decompress(&image[..PREAMBLE + 1]),
            Err(Error::Decompress(_))
        );
    }
}
