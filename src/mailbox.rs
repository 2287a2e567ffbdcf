use aredn_bridge_core::b2f::{utc_timestamp, MessageSink};
use aredn_bridge_core::mail::DecodedMessage;
use aredn_bridge_core::{Error, Result};
use log::*;
use std::fs;
use std::path::PathBuf;

/// Directory-backed message store.
///
/// Every accepted message lands under a `<YYYYMMDDHHMMSS>-<mid>` prefix as
/// `-headers.txt`, `-body.txt` (when the body is non-empty) and one binary
/// file per attachment. Existing files are never overwritten: a colliding
/// prefix gets a numeric suffix so all artifacts of one message stay
/// together and prior data survives.
pub struct Mailbox {
    root: PathBuf,
    keep_raw: bool,
}

impl Mailbox {
    /// A store rooted at `root`; the directory is created on first use.
    /// With `keep_raw` set, the raw framed bytes are kept as `<prefix>.b2f`.
    pub fn new(root: PathBuf, keep_raw: bool) -> Mailbox {
        Mailbox { root, keep_raw }
    }

    fn unique_prefix(&self, mid: &str) -> String {
        let base = format!("{}-{}", utc_timestamp(), mid);
        let mut candidate = base.clone();
        let mut suffix = 0u32;
        while self.root.join(format!("{}-headers.txt", candidate)).exists() {
            suffix += 1;
            candidate = format!("{}-{}", base, suffix);
        }
        candidate
    }

    // Individual artifacts are best-effort: one failed write must not cost
    // the rest of the message, let alone the rest of the batch.
    fn write_artifact(&self, name: &str, data: &[u8]) {
        let path = self.root.join(name);
        match fs::write(&path, data) {
            Ok(()) => debug!("wrote {:?} ({} bytes)", path, data.len()),
            Err(e) => warn!("failed to write {:?}: {}", path, e),
        }
    }
}

impl MessageSink for Mailbox {
    fn accept(&self, message: &DecodedMessage, raw: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::Store(format!("creating {:?}: {}", self.root, e)))?;

        let prefix = self.unique_prefix(&message.mid);
        self.write_artifact(&format!("{}-headers.txt", prefix), message.headers.as_bytes());
        if message.body_length > 0 {
            self.write_artifact(&format!("{}-body.txt", prefix), &message.body);
        }
        for attachment in &message.attachments {
            let filename = sanitize_filename(&attachment.filename);
            if attachment.truncated {
                warn!(
                    "storing truncated attachment {} ({} of {} bytes)",
                    filename,
                    attachment.data.len(),
                    attachment.declared_size
                );
            }
            self.write_artifact(&format!("{}-{}", prefix, filename), &attachment.data);
        }
        if self.keep_raw {
            self.write_artifact(&format!("{}.b2f", prefix), raw);
        }
        Ok(())
    }
}

/// Attachment names come straight off the wire; only the final path
/// component is usable.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(name)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        String::from("attachment.bin")
    } else {
        base.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aredn_bridge_core::mail::model::EPOCH;
    use aredn_bridge_core::mail::{Attachment, Position};
    use std::path::Path;

    fn sample_message() -> DecodedMessage {
        DecodedMessage {
            mid: "TESTMID00001".to_owned(),
            subject: "Test".to_owned(),
            sender: "W6XYZ".to_owned(),
            recipient: "BOB".to_owned(),
            date: EPOCH,
            body_length: 13,
            position: Some(Position {
                latitude: 37.0,
                longitude: -122.0,
            }),
            headers: "From: W6XYZ\r\nTo: BOB\r\nBody: 13".to_owned(),
            body: b"hello winlink".to_vec(),
            attachments: vec![Attachment {
                filename: "photo.jpg".to_owned(),
                declared_size: 4,
                data: vec![1, 2, 3, 4],
                truncated: false,
            }],
        }
    }

    fn artifacts(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_artifact_set() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Mailbox::new(dir.path().to_path_buf(), false);
        mailbox.accept(&sample_message(), b"raw").unwrap();

        let names = artifacts(dir.path());
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n.ends_with("-headers.txt")));
        assert!(names.iter().any(|n| n.ends_with("-body.txt")));
        assert!(names.iter().any(|n| n.ends_with("-photo.jpg")));

        let body = names.iter().find(|n| n.ends_with("-body.txt")).unwrap();
        assert_eq!(fs::read(dir.path().join(body)).unwrap(), b"hello winlink");
    }

    #[test]
    fn test_no_body_artifact_for_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Mailbox::new(dir.path().to_path_buf(), false);
        let mut message = sample_message();
        message.body_length = 0;
        message.body.clear();
        message.attachments.clear();
        mailbox.accept(&message, b"raw").unwrap();

        let names = artifacts(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with("-headers.txt"));
    }

    #[test]
    fn test_keep_raw_writes_audit_file() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Mailbox::new(dir.path().to_path_buf(), true);
        mailbox.accept(&sample_message(), b"\x01framed\x04").unwrap();

        let names = artifacts(dir.path());
        let raw = names.iter().find(|n| n.ends_with(".b2f")).unwrap();
        assert_eq!(fs::read(dir.path().join(raw)).unwrap(), b"\x01framed\x04");
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Mailbox::new(dir.path().to_path_buf(), false);
        let message = sample_message();
        mailbox.accept(&message, b"raw").unwrap();
        mailbox.accept(&message, b"raw").unwrap();

        let headers: Vec<String> = artifacts(dir.path())
            .into_iter()
            .filter(|n| n.ends_with("-headers.txt"))
            .collect();
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\temp\\x.bin"), "x.bin");
        assert_eq!(sanitize_filename(""), "attachment.bin");
        assert_eq!(sanitize_filename(".."), "attachment.bin");
    }

    #[test]
    fn test_create_dir_failure_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"file, not a directory").unwrap();
        let mailbox = Mailbox::new(blocker, false);
        assert!(matches!(
            mailbox.accept(&sample_message(), b"raw"),
            Err(Error::Store(_))
        ));
    }
}
