use super::model::{Attachment, DecodedMessage, Position, EPOCH};
use log::*;
use time::macros::format_description;
use time::PrimitiveDateTime;

/// Splits a decompressed payload into headers, body and attachments.
///
/// The payload layout is a CRLF-separated ASCII header block terminated by
/// the first blank line, then `Body:` bytes and one binary run per `File:`
/// header, each terminated by CRLF. Extraction never fails: missing headers
/// leave defaults in place, and an attachment cut short by the end of the
/// payload is returned as far as it goes with `truncated` set.
pub fn extract(proposal_mid: &str, frame_subject: &str, payload: &[u8]) -> DecodedMessage {
    let (header_bytes, rest) = match find_blank_line(payload) {
        Some(at) => (&payload[..at], &payload[at + 4..]),
        None => (payload, &payload[payload.len()..]),
    };
    let headers = String::from_utf8_lossy(header_bytes).into_owned();

    let mut message = DecodedMessage {
        mid: proposal_mid.to_owned(),
        subject: frame_subject.to_owned(),
        sender: String::new(),
        recipient: String::new(),
        date: EPOCH,
        body_length: 0,
        position: None,
        headers,
        body: Vec::new(),
        attachments: Vec::new(),
    };

    for line in message.headers.split("\r\n") {
        if let Some(value) = line.strip_prefix("Body: ") {
            message.body_length = value.trim().parse().unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("Date: ") {
            message.date = parse_date(value.trim()).unwrap_or(EPOCH);
        } else if let Some(value) = line.strip_prefix("From: ") {
            message.sender = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix("To: ") {
            message.recipient = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix("Subject: ") {
            message.subject = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix("Mid: ") {
            message.mid = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix("X-Location: ") {
            message.position = parse_location(value.trim());
        } else if let Some(value) = line.strip_prefix("File: ") {
            if let Some((size, filename)) = parse_file_header(value) {
                message.attachments.push(Attachment {
                    filename,
                    declared_size: size,
                    data: Vec::new(),
                    truncated: false,
                });
            } else {
                debug!("ignoring malformed File header: <{}>", value);
            }
        }
        // Unknown headers stay in the raw block; nothing else to do here.
    }

    let mut cursor = 0usize;
    if message.body_length > 0 {
        let take = message.body_length.min(rest.len());
        message.body = rest[..take].to_vec();
        cursor = take;
        cursor += crlf_at(rest, cursor);
    }

    for attachment in &mut message.attachments {
        let available = rest.len() - cursor;
        let take = attachment.declared_size.min(available);
        attachment.data = rest[cursor..cursor + take].to_vec();
        cursor += take;
        if take < attachment.declared_size {
            attachment.truncated = true;
            debug!(
                "attachment {} truncated at {} of {} bytes",
                attachment.filename, take, attachment.declared_size
            );
            break;
        }
        cursor += crlf_at(rest, cursor);
    }

    message
}

fn find_blank_line(payload: &[u8]) -> Option<usize> {
    payload.windows(4).position(|w| w == b"\r\n\r\n")
}

fn crlf_at(bytes: &[u8], at: usize) -> usize {
    if bytes[at..].starts_with(b"\r\n") {
        2
    } else {
        0
    }
}

fn parse_date(value: &str) -> Option<PrimitiveDateTime> {
    let format = format_description!("[year]/[month]/[day] [hour]:[minute]");
    PrimitiveDateTime::parse(value, format).ok()
}

fn parse_file_header(value: &str) -> Option<(usize, String)> {
    let (size, filename) = value.split_once(' ')?;
    let size = size.parse().ok()?;
    let filename = filename.trim();
    if filename.is_empty() {
        return None;
    }
    Some((size, filename.to_owned()))
}

/// Parses `lat[N|S], lon[E|W] (source)`; south and west come out negative.
fn parse_location(value: &str) -> Option<Position> {
    let (lat, rest) = value.split_once(',')?;
    let lon = rest.trim().split_whitespace().next()?;
    Some(Position {
        latitude: parse_coordinate(lat.trim(), 'N', 'S')?,
        longitude: parse_coordinate(lon, 'E', 'W')?,
    })
}

fn parse_coordinate(token: &str, positive: char, negative: char) -> Option<f64> {
    if let Some(number) = token.strip_suffix(positive) {
        number.parse().ok()
    } else if let Some(number) = token.strip_suffix(negative) {
        number.parse::<f64>().ok().map(|v| -v)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use time::macros::datetime;

    fn crlf(text: &str) -> String {
        text.replace('\n', "\r\n")
    }

    #[test]
    fn test_full_message() {
        let mut payload = crlf(indoc! {"
            Mid: QWERTY123456
            Date: 2025/08/08 20:40
            From: W6XYZ
            To: BOB
            Subject: Test
            Body: 13
            File: 4 photo.jpg
            File: 6 trace.bin
            X-Location: 37.420281N, 122.120632W (GPS)

            hello winlink
        "})
        .into_bytes();
        // The trailing newline of the heredoc terminates the body; append
        // the attachment runs.
        payload.extend_from_slice(b"\xDE\xAD\xBE\xEF\r\n");
        payload.extend_from_slice(b"\x01\x02\x03\x04\x05\x06\r\n");

        let message = extract("ABCDEF012345", "wire subject", &payload);
        assert_eq!(message.mid, "QWERTY123456");
        assert_eq!(message.sender, "W6XYZ");
        assert_eq!(message.recipient, "BOB");
        assert_eq!(message.subject, "Test");
        assert_eq!(message.date, datetime!(2025-08-08 20:40));
        assert_eq!(message.body_length, 13);
        assert_eq!(message.body, b"hello winlink");
        assert_eq!(message.attachments.len(), 2);
        assert_eq!(message.attachments[0].filename, "photo.jpg");
        assert_eq!(message.attachments[0].data, b"\xDE\xAD\xBE\xEF");
        assert!(!message.attachments[0].truncated);
        assert_eq!(message.attachments[1].data, b"\x01\x02\x03\x04\x05\x06");
        let position = message.position.unwrap();
        assert!((position.latitude - 37.420281).abs() < 1e-9);
        assert!((position.longitude + 122.120632).abs() < 1e-9);
    }

    #[test]
    fn test_missing_body_header() {
        let payload = crlf("From: W6XYZ\nTo: BOB\n\n").into_bytes();
        let message = extract("MID1", "Hi", &payload);
        assert_eq!(message.body_length, 0);
        assert!(message.body.is_empty());
        assert_eq!(message.subject, "Hi");
        assert_eq!(message.date, EPOCH);
    }

    #[test]
    fn test_defaults_when_headers_absent() {
        let payload = crlf("Body: 2\n\nok\n").into_bytes();
        let message = extract("MID2", "fallback", &payload);
        assert_eq!(message.sender, "");
        assert_eq!(message.recipient, "");
        assert_eq!(message.mid, "MID2");
        assert_eq!(message.body, b"ok");
        assert!(message.position.is_none());
    }

    #[test]
    fn test_unparsable_date_falls_back_to_epoch() {
        let payload = crlf("Date: yesterday\nBody: 1\n\nx\n").into_bytes();
        let message = extract("MID3", "s", &payload);
        assert_eq!(message.date, EPOCH);
    }

    #[test]
    fn test_truncated_attachment() {
        let mut payload = crlf("Body: 2\nFile: 10 big.bin\n\nok\n").into_bytes();
        payload.extend_from_slice(b"\x01\x02\x03");
        let message = extract("MID4", "s", &payload);
        assert_eq!(message.attachments.len(), 1);
        assert!(message.attachments[0].truncated);
        assert_eq!(message.attachments[0].data, b"\x01\x02\x03");
    }

    #[test]
    fn test_final_attachment_exactly_fills_payload() {
        let mut payload = crlf("Body: 2\nFile: 3 tail.bin\n\nok\n").into_bytes();
        payload.extend_from_slice(b"\x09\x08\x07");
        let message = extract("MID5", "s", &payload);
        assert!(!message.attachments[0].truncated);
        assert_eq!(message.attachments[0].data, b"\x09\x08\x07");
    }

    #[test]
    fn test_location_south_west_negative() {
        let payload = crlf("X-Location: 33.8688S, 151.2093E (manual)\n\n").into_bytes();
        let message = extract("MID6", "s", &payload);
        let position = message.position.unwrap();
        assert!(position.latitude < 0.0);
        assert!(position.longitude > 0.0);
    }

    #[test]
    fn test_unknown_headers_preserved_in_raw_block() {
        let payload = crlf("X-Custom: something\nFrom: W6XYZ\n\n").into_bytes();
        let message = extract("MID7", "s", &payload);
        assert!(message.headers.contains("X-Custom: something"));
    }

    #[test]
    fn test_no_blank_line_treats_everything_as_headers() {
        let payload = crlf("From: W6XYZ\nTo: BOB").into_bytes();
        let message = extract("MID8", "s", &payload);
        assert_eq!(message.sender, "W6XYZ");
        assert!(message.body.is_empty());
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_metadata_json_shape() {
        let payload = crlf(indoc! {"
            Date: 2025/08/08 20:40
            From: W6XYZ
            To: BOB
            Subject: Position report
            X-Location: 10.5N, 20.25W (GPS)

        "})
        .into_bytes();
        let message = extract("MIDJSON", "s", &payload);
        let value: serde_json::Value = serde_json::from_str(&message.metadata_json()).unwrap();
        assert_eq!(value["message_id"], "MIDJSON");
        assert_eq!(value["sender"], "W6XYZ");
        assert_eq!(value["recipient"], "BOB");
        assert_eq!(value["date"], "2025-08-08T20:40:00Z");
        assert_eq!(value["position"]["latitude"], 10.5);
        assert_eq!(value["position"]["longitude"], -20.25);
    }
}
