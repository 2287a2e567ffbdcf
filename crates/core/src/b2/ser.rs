//! Frame composition, the mirror image of the deserializer.

use super::model::*;
use crate::{Error, Result};
use cookie_factory::{
    bytes::be_u8,
    combinator::{cond, slice, string},
    gen_simple,
    multi::all,
    sequence::tuple,
    SerializeFn,
};
use std::io::Write;

/// Serializes `payload` (a compressed image including its codec preamble)
/// into B2 framing, splitting it into blocks of at most `block_size` bytes.
///
/// When `offset` is non-zero the first [`LEAD_BYTES`] bytes of the payload
/// are emitted as the resume prologue ahead of the regular blocks, exactly
/// as the deserializer expects to reassemble them.
pub fn compose(subject: &str, offset: u32, payload: &[u8], block_size: u8) -> Result<Vec<u8>> {
    if block_size == 0 || block_size > MAX_BLOCK {
        return Err(Error::Format("block size"));
    }
    if !subject.is_ascii() || subject.contains('\0') {
        return Err(Error::Format("subject must be ASCII"));
    }
    let offset_text = offset.to_string();
    if subject.len() + offset_text.len() + 2 > u8::MAX as usize {
        return Err(Error::Format("subject too long"));
    }
    let (lead, rest) = if offset != 0 {
        if payload.len() < LEAD_BYTES {
            return Err(Error::Format("payload shorter than lead bytes"));
        }
        (&payload[..LEAD_BYTES], &payload[LEAD_BYTES..])
    } else {
        (&payload[..0], payload)
    };

    let frame = tuple((
        prologue(subject, &offset_text),
        cond(
            offset != 0,
            tuple((be_u8(STX), be_u8(LEAD_BYTES as u8), slice(lead))),
        ),
        all(rest.chunks(block_size as usize).map(block)),
        be_u8(EOT),
        be_u8(B2Frame::calculate_checksum(payload)),
    ));

    gen_simple(frame, Vec::new()).map_err(|_| Error::Format("frame serialization"))
}

fn prologue<'a, W: Write + 'a>(subject: &'a str, offset_text: &'a str) -> impl SerializeFn<W> + 'a {
    tuple((
        be_u8(SOH),
        be_u8((subject.len() + offset_text.len() + 2) as u8),
        string(subject),
        be_u8(NUL),
        string(offset_text),
        be_u8(NUL),
    ))
}

fn block<'a, W: Write + 'a>(chunk: &'a [u8]) -> impl SerializeFn<W> + 'a {
    tuple((be_u8(STX), be_u8(chunk.len() as u8), slice(chunk)))
}
