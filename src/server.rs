use crate::mailbox::Mailbox;
use crate::users::UserDirectory;
use anyhow::Result;
use aredn_bridge_core::b2f::{Session, SessionConfig};
use aredn_bridge_core::lzhuf::Lzhuf;
use log::*;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Binds the listening socket. Kept separate from [`serve`] so `main` can
/// map a bind failure onto its dedicated exit code.
pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

/// Accept loop: one task per inbound connection, each owning its session.
///
/// Sessions share nothing mutable — the user directory and mailbox travel
/// behind `Arc` and are read-only respectively append-only. Ctrl-C cancels
/// the token; in-flight sessions are dropped with their sockets.
pub async fn serve(
    listener: TcpListener,
    users: Arc<UserDirectory>,
    mailbox: Arc<Mailbox>,
    config: SessionConfig,
) -> Result<()> {
    let token = CancellationToken::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                token.cancel();
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {}", e);
                        continue;
                    }
                };
                info!("connection from {}", peer);
                let session = Session::new(
                    stream,
                    peer.to_string(),
                    users.clone(),
                    mailbox.clone(),
                    Lzhuf,
                    config.clone(),
                );
                let token = token.child_token();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("{}: dropped at shutdown", peer);
                        }
                        result = session.run() => {
                            if let Err(e) = result {
                                warn!("{}: session error: {}", peer, e);
                            }
                        }
                    }
                });
            }
        }
    }
    Ok(())
}
