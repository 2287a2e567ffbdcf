use crate::{Error, Result};

/// Peer system identifier from the bracketed SID line, e.g.
/// `[RMS Express-1.7.17.0-B2FHM$]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSid {
    /// Implementing program.
    pub author: String,
    /// Program version; absent when the SID has only two segments.
    pub version: Option<String>,
    /// Supported-feature list, usually ending in `$`.
    pub features: String,
}

impl PeerSid {
    /// Parses a `[author-version-features]` line.
    ///
    /// With only two segments the second one is taken as the feature list;
    /// segments beyond the third are ignored.
    pub fn parse(line: &str) -> Result<PeerSid> {
        let inner = line
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or(Error::Format("SID brackets"))?;
        let parts: Vec<&str> = inner.split('-').collect();
        if parts.len() < 2 {
            return Err(Error::Format("SID segments"));
        }
        if parts.len() == 2 {
            Ok(PeerSid {
                author: parts[0].to_owned(),
                version: None,
                features: parts[1].to_owned(),
            })
        } else {
            Ok(PeerSid {
                author: parts[0].to_owned(),
                version: Some(parts[1].to_owned()),
                features: parts[2].to_owned(),
            })
        }
    }
}
