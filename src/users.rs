use anyhow::{Context, Result};
use aredn_bridge_core::b2f::Authenticator;
use log::*;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Read-only callsign → password map loaded once at startup.
///
/// A missing or unreadable credential file yields an empty directory, which
/// makes every login fail rather than letting anyone in.
pub struct UserDirectory {
    users: HashMap<String, String>,
}

impl UserDirectory {
    /// Loads the JSON credential file `{ "CALLSIGN": "password", ... }`.
    pub fn load(path: &Path) -> UserDirectory {
        match Self::read(path) {
            Ok(users) => {
                info!("loaded {} users from {:?}", users.len(), path);
                UserDirectory { users }
            }
            Err(e) => {
                warn!("{:#}; all logins will fail", e);
                UserDirectory {
                    users: HashMap::new(),
                }
            }
        }
    }

    fn read(path: &Path) -> Result<HashMap<String, String>> {
        let text =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse the {:?} user file", path))
    }

    /// Number of known callsigns.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True when no credential file could be loaded.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Authenticator for UserDirectory {
    fn check(&self, callsign: &str, password: &str) -> bool {
        match self.users.get(callsign) {
            Some(stored) => constant_time_eq(stored.as_bytes(), password.as_bytes()),
            None => false,
        }
    }
}

// The protocol predates hashed passwords; the least we can do is not leak
// match length through timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= usize::from(x ^ y);
    }
    diff == 0
}
