//! The decoded message and its JSON metadata view.

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;
use time::PrimitiveDateTime;

/// A binary attachment declared by a `File:` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name from the header line.
    pub filename: String,
    /// Size the header announced.
    pub declared_size: usize,
    /// The extracted bytes.
    pub data: Vec<u8>,
    /// Set when the payload ran out before `declared_size` bytes arrived.
    pub truncated: bool,
}

/// Geographic position from an `X-Location:` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    /// Degrees north (negative for south).
    pub latitude: f64,
    /// Degrees east (negative for west).
    pub longitude: f64,
}

/// The mail artifact recovered from one decompressed B2 payload.
///
/// Missing headers never fail extraction; the affected fields keep their
/// defaults (empty sender/recipient, epoch date, no position).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Message identifier: the `Mid:` header when present, otherwise the
    /// identifier announced by the proposal.
    pub mid: String,
    /// `Subject:` header, falling back to the frame prologue subject.
    pub subject: String,
    /// Sending callsign from `From:`.
    pub sender: String,
    /// Receiving callsign from `To:`.
    pub recipient: String,
    /// `Date:` header (UTC).
    pub date: PrimitiveDateTime,
    /// Body length announced by `Body:`.
    pub body_length: usize,
    /// Optional position from `X-Location:`.
    pub position: Option<Position>,
    /// The raw header block, preserved verbatim for the headers artifact.
    pub headers: String,
    /// Body bytes.
    pub body: Vec<u8>,
    /// Attachments in `File:` header order.
    pub attachments: Vec<Attachment>,
}

/// Epoch fallback for messages without a parsable `Date:` header.
pub const EPOCH: PrimitiveDateTime = datetime!(1970-01-01 0:00);

/// Downstream-tool view of a message, serialized as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    /// Message identifier.
    pub message_id: String,
    /// RFC 3339 date string.
    pub date: String,
    /// Sending callsign.
    pub sender: String,
    /// Receiving callsign.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Reported position, zeroed when the message carried none.
    pub position: Position,
}

impl DecodedMessage {
    /// Metadata summary for downstream tools.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            message_id: self.mid.clone(),
            date: self
                .date
                .assume_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::new()),
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            subject: self.subject.clone(),
            position: self.position.unwrap_or_default(),
        }
    }

    /// The metadata summary as a JSON string.
    pub fn metadata_json(&self) -> String {
        serde_json::to_string_pretty(&self.metadata()).unwrap_or_else(|_| String::from("{}"))
    }
}
