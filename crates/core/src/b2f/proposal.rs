use crate::{Error, Result};

/// Longest message identifier the protocol allows.
pub const MAX_MID_LEN: usize = 12;

/// A client offer to transmit one message, parsed from an `FC` line:
///
/// ```text
/// FC <kind> <mid> <uncompressed> <compressed> <flag>
/// ```
///
/// Proposals queue up in arrival order and are consumed FIFO once the
/// client ends the round with `F>` and streams the batch payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// Two-character type tag, e.g. `EM` for plain email.
    pub kind: String,
    /// Message identifier, up to 12 printable ASCII characters.
    pub mid: String,
    /// Byte count of the fully decompressed payload.
    pub uncompressed_size: u32,
    /// Byte count of the compressed image, codec preamble included.
    pub compressed_size: u32,
    /// Forward/hold hint; opaque to this endpoint. `'0'` when the client
    /// omitted it.
    pub status_flag: char,
}

impl Proposal {
    /// Parses one `FC` line.
    pub fn parse(line: &str) -> Result<Proposal> {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("FC") {
            return Err(Error::Format("not an FC line"));
        }
        let kind = parts.next().ok_or(Error::Format("FC arity"))?;
        let mid = parts.next().ok_or(Error::Format("FC arity"))?;
        let uncompressed = parts.next().ok_or(Error::Format("FC arity"))?;
        let compressed = parts.next().ok_or(Error::Format("FC arity"))?;
        let status_flag = parts
            .next()
            .and_then(|flag| flag.chars().next())
            .unwrap_or('0');

        if mid.is_empty() || mid.len() > MAX_MID_LEN || !mid.bytes().all(|b| b.is_ascii_graphic())
        {
            return Err(Error::Format("FC message id"));
        }

        Ok(Proposal {
            kind: kind.to_owned(),
            mid: mid.to_owned(),
            uncompressed_size: uncompressed
                .parse()
                .map_err(|_| Error::Format("FC uncompressed size"))?,
            compressed_size: compressed
                .parse()
                .map_err(|_| Error::Format("FC compressed size"))?,
            status_flag,
        })
    }
}
