//!
//! # AREDN Bridge
//!
//! A Winlink B2F server endpoint: client stations connect over TCP, log in
//! with callsign and password, propose messages, and stream their
//! compressed payloads; accepted mail is unpacked into per-message header,
//! body and attachment files under the mailbox directory.
//!
use anyhow::Result;
use aredn_bridge_core::b2f::SessionConfig;
use clap::Parser;
use env_logger::Env;
use log::*;
use std::sync::Arc;
use std::time::Duration;

mod cmdline;
mod mailbox;
mod server;
mod users;

use cmdline::Opt;
use mailbox::Mailbox;
use users::UserDirectory;

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let default_level = if opt.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!(
        "AREDN Bridge {} starting on {}:{}",
        env!("CARGO_PKG_VERSION"),
        opt.host,
        opt.port
    );

    let users = Arc::new(UserDirectory::load(&opt.users));
    if users.is_empty() {
        warn!("user directory is empty; every login will be refused");
    } else {
        info!("user directory holds {} callsigns", users.len());
    }
    let mailbox = Arc::new(Mailbox::new(opt.mailbox.clone(), opt.keep_raw));
    let config = SessionConfig {
        line_timeout: Duration::from_secs(opt.timeout.max(1)),
        batch_timeout: Duration::from_secs(opt.timeout.max(1) * 5),
    };

    let listener = match server::bind(&opt.host, opt.port).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}:{}: {}", opt.host, opt.port, e);
            std::process::exit(2);
        }
    };
    info!("listening on {}:{}", opt.host, opt.port);

    server::serve(listener, users, mailbox, config).await?;
    info!("shut down cleanly");
    Ok(())
}
