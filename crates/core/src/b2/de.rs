use super::model::*;
use crate::Error;
use nom::{
    bytes::streaming::{tag, take, take_till},
    combinator::{cond, consumed, map_res, verify},
    error::context as error_context,
    error::{ContextError, ErrorKind, ParseError},
    number::streaming::le_u8,
    sequence::{preceded, terminated},
};

type IResult<I, O, E = nom::error::VerboseError<I>> = Result<(I, O), nom::Err<E>>;

/// Reason attached to [`crate::Error::Format`] when a frame ends before its
/// trailer: the input ran out rather than holding anything malformed.
pub(crate) const TRUNCATED_FRAME: &str = "truncated frame";

impl B2Frame {
    /// Parses one frame from the start of `buf` and verifies its trailing
    /// checksum.
    ///
    /// Returns the frame together with the number of bytes consumed, so the
    /// caller can slice the next frame out of a multi-proposal batch blob.
    pub fn deserialize(buf: &[u8]) -> Result<(B2Frame, usize), Error> {
        let (frame, amount) = match consumed(b2_frame)(buf) {
            Ok((_, (parsed_buf, frame))) => (frame, parsed_buf.len()),
            Err(e) => return Err(nom_error(e)),
        };

        let calculated = B2Frame::calculate_checksum(&frame.compressed);
        if calculated != frame.checksum {
            return Err(Error::Checksum {
                calculated,
                transmitted: frame.checksum,
            });
        }
        Ok((frame, amount))
    }
}

fn nom_error(err: nom::Err<nom::error::VerboseError<&[u8]>>) -> Error {
    match err {
        nom::Err::Incomplete(_) => Error::Format(TRUNCATED_FRAME),
        nom::Err::Error(e) | nom::Err::Failure(e) => Error::Format(
            e.errors
                .iter()
                .find_map(|(_, kind)| match kind {
                    nom::error::VerboseErrorKind::Context(ctx) => Some(*ctx),
                    _ => None,
                })
                .unwrap_or("malformed frame"),
        ),
    }
}

fn make_error<I, E>(input: I, ctx: &'static str, kind: ErrorKind) -> E
where
    I: std::marker::Copy,
    E: ParseError<I> + ContextError<I>,
{
    E::add_context(input, ctx, E::from_error_kind(input, kind))
}

fn b2_frame(buf: &[u8]) -> IResult<&[u8], B2Frame> {
    let (buf, _) = error_context("SOH", tag([SOH].as_ref()))(buf)?;
    // The prologue length byte duplicates the subject/offset text length and
    // is not needed to locate the NUL-terminated fields that follow.
    let (buf, _prologue_len) = error_context("prologue length", le_u8)(buf)?;
    let (buf, subject) = error_context("subject", ascii_field)(buf)?;
    let (buf, offset) = error_context("offset", offset_field)(buf)?;

    // A resumed transfer repeats the first 6 bytes of the compressed image
    // ahead of the regular blocks.
    let (mut rest, lead) = cond(offset != 0, error_context("lead bytes", lead_bytes))(buf)?;
    let mut compressed = Vec::new();
    if let Some(lead) = lead {
        compressed.extend_from_slice(lead);
    }

    loop {
        let (buf, marker) = error_context("STX or EOT", le_u8)(rest)?;
        match marker {
            STX => {
                let (buf, len) =
                    error_context("block length", verify(le_u8, |l| *l <= MAX_BLOCK))(buf)?;
                let (buf, data) = error_context("block data", take(len as usize))(buf)?;
                compressed.extend_from_slice(data);
                rest = buf;
            }
            EOT => {
                let (buf, checksum) = error_context("checksum", le_u8)(buf)?;
                return Ok((
                    buf,
                    B2Frame {
                        subject,
                        offset,
                        compressed,
                        checksum,
                    },
                ));
            }
            _ => {
                return Err(nom::Err::Error(make_error(
                    rest,
                    "STX or EOT",
                    ErrorKind::Tag,
                )))
            }
        }
    }
}

fn ascii_field(buf: &[u8]) -> IResult<&[u8], String> {
    map_res(
        terminated(take_till(|b| b == NUL), tag([NUL].as_ref())),
        |bytes: &[u8]| {
            std::str::from_utf8(bytes)
                .ok()
                .filter(|s| s.is_ascii())
                .map(str::to_owned)
                .ok_or("field must be ASCII")
        },
    )(buf)
}

fn offset_field(buf: &[u8]) -> IResult<&[u8], u32> {
    map_res(
        terminated(take_till(|b| b == NUL), tag([NUL].as_ref())),
        |bytes: &[u8]| {
            std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or("offset must be ASCII decimal")
        },
    )(buf)
}

fn lead_bytes(buf: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tag([STX, 0x06].as_ref()), take(LEAD_BYTES))(buf)
}
