#![warn(missing_docs)]
//!
//! # AREDN Bridge Core
//!
//! Protocol engine for a Winlink B2F server endpoint: the line-plus-binary
//! dialog that amateur-radio client stations use to push compressed
//! radiogram messages into a central mailbox.
//!
//! The crate is split along the protocol layers:
//!
//! - [`b2`] — the binary envelope framing a single message (SOH/STX/EOT
//!   blocks guarded by a trailing checksum)
//! - [`lzhuf`] — the LZHUF codec that (de)compresses the framed image
//! - [`mail`] — extraction of headers, body and attachments from the
//!   decompressed payload
//! - [`b2f`] — the per-connection session state machine and its line
//!   transport
//!
//! Nothing in here binds a socket or touches the filesystem: the session
//! engine is generic over the byte stream and over the credential-check and
//! persistence seams, so callers (and tests) inject their own.
//!

pub mod b2;
pub mod b2f;
pub mod lzhuf;
pub mod mail;

mod error;

pub use error::{Error, Result};
