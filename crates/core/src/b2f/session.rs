use super::proposal::Proposal;
use super::sid::PeerSid;
use super::transport::{BatchEnd, LineTransport};
use super::utc_timestamp;
use crate::b2::{B2Frame, TRUNCATED_FRAME};
use crate::lzhuf::Codec;
use crate::mail::{self, DecodedMessage};
use crate::{Error, Result};
use bytes::Buf;
use log::*;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Unknown commands tolerated before the session gives up on the peer.
const MAX_UNKNOWN_COMMANDS: u32 = 3;

/// Credential check seam: a read-only map of callsign to password.
pub trait Authenticator: Send + Sync {
    /// True when `password` is the stored secret for `callsign`.
    fn check(&self, callsign: &str, password: &str) -> bool;
}

impl<T: Authenticator + ?Sized> Authenticator for std::sync::Arc<T> {
    fn check(&self, callsign: &str, password: &str) -> bool {
        (**self).check(callsign, password)
    }
}

/// Persistence seam for accepted messages.
///
/// Failures are logged by the session but do not abort the batch: the
/// remaining messages are still attempted.
pub trait MessageSink: Send + Sync {
    /// Persist one decoded message. `raw` holds the message's on-wire
    /// framed bytes for optional audit storage.
    fn accept(&self, message: &DecodedMessage, raw: &[u8]) -> Result<()>;
}

impl<T: MessageSink + ?Sized> MessageSink for std::sync::Arc<T> {
    fn accept(&self, message: &DecodedMessage, raw: &[u8]) -> Result<()> {
        (**self).accept(message, raw)
    }
}

/// Per-session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle window for interactive line reads.
    pub line_timeout: Duration,
    /// Idle window while draining the batch blob in RECEIVING.
    pub batch_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            line_timeout: Duration::from_secs(1),
            batch_timeout: Duration::from_secs(5),
        }
    }
}

/// Protocol states of one B2F dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Connection accepted, nothing exchanged yet.
    Start,
    /// About to start the login dialog.
    Connected,
    /// Waiting for the peer's callsign.
    CallsignEntry,
    /// Waiting for the peer's password.
    Password,
    /// Credentials verified; banner not yet sent.
    LoginOk,
    /// Dispatching CR-terminated command lines.
    Command,
    /// At least one proposal queued; more may follow.
    ProposalPending,
    /// Draining the binary batch blob.
    Receiving,
    /// Terminal state; the socket is dropped.
    Closing,
}

/// One per-connection protocol context, owned exclusively by its task.
///
/// The session is generic over the byte stream and over its three seams —
/// credentials, persistence, decompression — so the acceptor wires in the
/// real directory/mailbox/codec while tests drive an in-memory dialog.
pub struct Session<T, A, S, C> {
    transport: LineTransport<T>,
    peer: String,
    auth: A,
    sink: S,
    codec: C,
    config: SessionConfig,
    callsign: Option<String>,
    peer_sid: Option<PeerSid>,
    routing_hints: Vec<String>,
    queue: VecDeque<Proposal>,
    unknown_commands: u32,
}

impl<T, A, S, C> Session<T, A, S, C>
where
    T: AsyncRead + AsyncWrite + Unpin,
    A: Authenticator,
    S: MessageSink,
    C: Codec,
{
    /// Wraps an accepted connection. `peer` is used only for diagnostics.
    pub fn new(
        stream: T,
        peer: String,
        auth: A,
        sink: S,
        codec: C,
        config: SessionConfig,
    ) -> Session<T, A, S, C> {
        Session {
            transport: LineTransport::new(stream, config.line_timeout),
            peer,
            auth,
            sink,
            codec,
            config,
            callsign: None,
            peer_sid: None,
            routing_hints: Vec::new(),
            queue: VecDeque::new(),
            unknown_commands: 0,
        }
    }

    /// Drives the state machine until the dialog closes.
    pub async fn run(mut self) -> Result<()> {
        let mut state = State::Start;
        while state != State::Closing {
            let next = self.step(state).await?;
            if next != state {
                debug!("{}: state {:?} -> {:?}", self.peer, state, next);
            }
            state = next;
        }
        info!("{}: closing connection", self.peer);
        Ok(())
    }

    async fn step(&mut self, state: State) -> Result<State> {
        match state {
            State::Start => Ok(State::Connected),
            State::Connected => Ok(State::CallsignEntry),
            State::CallsignEntry => self.callsign_entry().await,
            State::Password => self.password_entry().await,
            State::LoginOk => self.login_ok().await,
            State::Command | State::ProposalPending => self.command(state).await,
            State::Receiving => self.receiving().await,
            State::Closing => Ok(State::Closing),
        }
    }

    async fn prompt(&mut self, prompt: &[u8]) -> Result<Option<String>> {
        self.transport.send(prompt).await?;
        self.transport.read_line().await
    }

    async fn callsign_entry(&mut self) -> Result<State> {
        match self.prompt(b"Callsign :\r").await? {
            Some(callsign) if !callsign.is_empty() => {
                debug!("{}: callsign <{}>", self.peer, callsign);
                self.callsign = Some(callsign);
                // Some clients will not proceed without the UTC mark.
                let stamp = format!(";FW:{}\r", utc_timestamp());
                self.transport.send(stamp.as_bytes()).await?;
                Ok(State::Password)
            }
            _ => Ok(State::Closing),
        }
    }

    async fn password_entry(&mut self) -> Result<State> {
        let password = match self.prompt(b"Password :\r").await? {
            Some(password) if !password.is_empty() => password,
            _ => return Ok(State::Closing),
        };
        let callsign = self.callsign.clone().unwrap_or_default();
        if self.auth.check(&callsign, &password) {
            info!("{}: {} logged in", self.peer, callsign);
            Ok(State::LoginOk)
        } else {
            warn!("{}: {} for {}", self.peer, Error::Auth, callsign);
            self.transport.send(b";NAK\r").await?;
            Ok(State::Closing)
        }
    }

    async fn login_ok(&mut self) -> Result<State> {
        self.transport.send(b"[AREDN_BRIDGE-1.0-B2F$]\r").await?;
        self.transport.send(b";PQ: 00000001\r").await?;
        self.transport.send(b"CMS>\r").await?;
        Ok(State::Command)
    }

    async fn command(&mut self, state: State) -> Result<State> {
        let line = match self.transport.read_line().await? {
            Some(line) => line,
            None => return Ok(State::Closing),
        };

        if line.starts_with("FC") {
            match Proposal::parse(&line) {
                Ok(proposal) => {
                    debug!(
                        "{}: proposal {} ({}, {} -> {} bytes)",
                        self.peer,
                        proposal.mid,
                        proposal.kind,
                        proposal.compressed_size,
                        proposal.uncompressed_size
                    );
                    self.queue.push_back(proposal);
                    Ok(State::ProposalPending)
                }
                Err(e) => {
                    // A lost proposal desynchronizes the whole payload
                    // schedule; the session is not recoverable.
                    warn!("{}: bad proposal <{}>: {}", self.peer, line, e);
                    let nak = format!(";NAK: {}\r", e.nak_reason());
                    self.transport.send(nak.as_bytes()).await?;
                    Ok(State::Closing)
                }
            }
        } else if line.starts_with("F>") {
            if self.queue.is_empty() {
                self.transport.send(b"FQ\r").await?;
                Ok(State::Closing)
            } else {
                let accepted = "Y".repeat(self.queue.len());
                self.transport
                    .send(format!("FS {}\r", accepted).as_bytes())
                    .await?;
                Ok(State::Receiving)
            }
        } else if line.starts_with("FF") {
            self.transport.send(b"FQ\r").await?;
            Ok(State::Closing)
        } else if line == "EXIT" {
            Ok(State::Closing)
        } else if line.starts_with('[') && line.ends_with(']') {
            match PeerSid::parse(&line) {
                Ok(sid) => {
                    self.peer_sid = Some(sid);
                    debug!("{}: peer identifies as {:?}", self.peer, self.peer_sid);
                    Ok(state)
                }
                Err(e) => {
                    warn!("{}: invalid SID <{}>: {}", self.peer, line, e);
                    Ok(State::Closing)
                }
            }
        } else if let Some(hint) = line.strip_prefix(";FW:") {
            self.routing_hints
                .extend(hint.split_whitespace().map(str::to_owned));
            debug!("{}: routing hints {:?}", self.peer, self.routing_hints);
            Ok(state)
        } else if line.starts_with(";PQ:") || line.starts_with(";PM:") || line.starts_with("; ") {
            debug!("{}: info line <{}>", self.peer, line);
            Ok(state)
        } else {
            self.unknown_commands += 1;
            warn!("{}: unknown command <{}>", self.peer, line);
            self.transport.send(b";NAK: Unknown\r").await?;
            if self.unknown_commands >= MAX_UNKNOWN_COMMANDS {
                Ok(State::Closing)
            } else {
                Ok(state)
            }
        }
    }

    async fn receiving(&mut self) -> Result<State> {
        let (mut blob, ended) = self
            .transport
            .read_available(self.config.batch_timeout)
            .await?;
        if blob.is_empty() {
            warn!("{}: batch payload never arrived", self.peer);
            self.transport.send(b";NAK: Timeout\r").await?;
            self.queue.clear();
            return Ok(State::Closing);
        }
        debug!(
            "{}: {} byte batch covering {} proposals",
            self.peer,
            blob.len(),
            self.queue.len()
        );

        while let Some(proposal) = self.queue.pop_front() {
            match self.ingest(&proposal, &blob) {
                Ok(consumed) => blob.advance(consumed),
                Err(e) => {
                    // An incomplete frame after the peer went quiet is a
                    // stall, not a framing defect.
                    let stalled = ended == BatchEnd::Idle
                        && matches!(&e, Error::Format(reason) if *reason == TRUNCATED_FRAME);
                    let reason = if stalled { "Timeout" } else { e.nak_reason() };
                    warn!("{}: rejecting message {}: {}", self.peer, proposal.mid, e);
                    let nak = format!(";NAK: {}\r", reason);
                    self.transport.send(nak.as_bytes()).await?;
                    self.queue.clear();
                    return Ok(State::Closing);
                }
            }
        }
        if !blob.is_empty() {
            debug!("{}: {} unclaimed bytes after batch", self.peer, blob.len());
        }
        self.transport.send(b"FF\r").await?;
        Ok(State::Command)
    }

    /// Parses, decompresses, extracts and persists the next message of the
    /// batch. Returns how many blob bytes the frame consumed.
    fn ingest(&self, proposal: &Proposal, blob: &[u8]) -> Result<usize> {
        let (frame, consumed) = B2Frame::deserialize(blob)?;
        frame.validate(proposal)?;
        let payload = self.codec.decompress(&frame.compressed)?;
        let message = mail::extract(&proposal.mid, &frame.subject, &payload);
        info!(
            "{}: accepted {} <{}> from <{}> to <{}> ({} body bytes, {} attachments)",
            self.peer,
            message.mid,
            message.subject,
            message.sender,
            message.recipient,
            message.body.len(),
            message.attachments.len()
        );
        debug!("{}: metadata {}", self.peer, message.metadata_json());
        if let Err(e) = self.sink.accept(&message, &blob[..consumed]) {
            // Store failures do not abort the batch; later messages still
            // get their chance.
            warn!("{}: persisting {} failed: {}", self.peer, message.mid, e);
        }
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lzhuf::Lzhuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct StaticAuth;

    impl Authenticator for StaticAuth {
        fn check(&self, callsign: &str, password: &str) -> bool {
            callsign == "W6XYZ" && password == "secret"
        }
    }

    struct NullSink;

    impl MessageSink for NullSink {
        fn accept(&self, _message: &DecodedMessage, _raw: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            line_timeout: Duration::from_millis(200),
            batch_timeout: Duration::from_millis(200),
        }
    }

    async fn dialog(client_sends: &[u8]) -> String {
        let (server, mut client) = tokio::io::duplex(1 << 16);
        let session = Session::new(
            server,
            "test".to_owned(),
            StaticAuth,
            NullSink,
            Lzhuf,
            test_config(),
        );
        let handle = tokio::spawn(session.run());
        client.write_all(client_sends).await.unwrap();
        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        handle.await.unwrap().unwrap();
        String::from_utf8_lossy(&output).into_owned()
    }

    #[tokio::test]
    async fn test_wrong_password_gets_nak() {
        let output = dialog(b"W6XYZ\rwrongpw\r").await;
        assert!(output.starts_with("Callsign :\r"));
        assert!(output.contains("Password :\r"));
        assert!(output.ends_with(";NAK\r"));
        assert!(!output.contains("CMS>"));
    }

    #[tokio::test]
    async fn test_login_banner_order() {
        let output = dialog(b"W6XYZ\rsecret\rEXIT\r").await;
        let banner = output.find("[AREDN_BRIDGE-1.0-B2F$]\r").unwrap();
        let pq = output.find(";PQ: 00000001\r").unwrap();
        let cms = output.find("CMS>\r").unwrap();
        assert!(banner < pq && pq < cms);
    }

    #[tokio::test]
    async fn test_ff_without_messages_gets_fq() {
        let output = dialog(b"W6XYZ\rsecret\r[RMS-1.0-B]\rFF\r").await;
        assert!(output.ends_with("FQ\r"));
    }

    #[tokio::test]
    async fn test_unknown_commands_close_after_three() {
        let output = dialog(b"W6XYZ\rsecret\rBOGUS1\rBOGUS2\rBOGUS3\rFF\r").await;
        assert_eq!(output.matches(";NAK: Unknown\r").count(), 3);
        // Session closed on the third strike; the trailing FF went nowhere.
        assert!(!output.contains("FQ\r"));
    }

    #[tokio::test]
    async fn test_empty_callsign_closes_silently() {
        let output = dialog(b"").await;
        assert_eq!(output, "Callsign :\r");
    }

    #[tokio::test]
    async fn test_fs_never_sent_without_proposals() {
        let output = dialog(b"W6XYZ\rsecret\rF>\r").await;
        assert!(!output.contains("FS"));
        assert!(output.ends_with("FQ\r"));
    }
}
