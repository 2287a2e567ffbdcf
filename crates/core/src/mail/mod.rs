//! Extraction of mail artifacts — header map, body, binary attachments —
//! from a decompressed B2 payload.

mod extract;
pub mod model;

pub use extract::extract;
pub use model::{Attachment, DecodedMessage, Metadata, Position};
