use clap::Parser;
use std::path::PathBuf;

/// Command line options for the B2F endpoint.
#[derive(Parser, Debug)]
#[command(name = "aredn-bridge", about = "Winlink B2F endpoint for AREDN mesh mailboxes")]
pub struct Opt {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// TCP port for inbound B2F connections
    #[arg(long, default_value_t = 8772)]
    pub port: u16,
    /// Credential file, a JSON object of callsign to password
    #[arg(long, default_value = "users.json")]
    pub users: PathBuf,
    /// Directory that receives the per-message mail artifacts
    #[arg(long, default_value = "mailbox")]
    pub mailbox: PathBuf,
    /// Idle timeout in seconds for interactive reads; batch reads allow
    /// five times as long
    #[arg(long, default_value_t = 1)]
    pub timeout: u64,
    /// Also store the raw framed bytes of each message as a .b2f audit file
    #[arg(long)]
    pub keep_raw: bool,
    /// Log at debug level
    #[arg(long)]
    pub debug: bool,
}
