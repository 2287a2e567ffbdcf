//! The B2 binary envelope: SOH prologue, STX data blocks, EOT trailer.
//!
//! A batch blob may hold several frames back to back; the deserializer
//! reports how many bytes it consumed so the caller can walk the blob one
//! proposal at a time.

mod de;
pub mod model;
pub mod ser;

pub(crate) use de::TRUNCATED_FRAME;
pub use model::B2Frame;
