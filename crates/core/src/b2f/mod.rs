//! The B2F dialog: line transport, proposal and SID models, and the
//! per-connection session state machine.

mod proposal;
mod session;
mod sid;
mod transport;

pub use proposal::Proposal;
pub use session::{Authenticator, MessageSink, Session, SessionConfig, State};
pub use sid::PeerSid;
pub use transport::{BatchEnd, LineTransport};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const TIMESTAMP_FORMAT: &'static [FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// Current UTC time as the `YYYYMMDDHHMMSS` string used on `;FW:` lines and
/// in mailbox file prefixes.
pub fn utc_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| String::from("00000000000000"))
}
