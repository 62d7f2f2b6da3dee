//! Wire framing: newline-delimited frame reassembly across socket reads,
//! and parsing/formatting of the publisher, subscriber, and push frames
//! described in the broker's external interface.

use crate::error::BrokerError;
use crate::topic::Topic;

/// Accumulates bytes across reads on one connection and yields complete
/// `\n`-terminated frames (the `\n` stripped), retaining any trailing
/// partial frame for the next `feed` call. This is what closes the framing
/// gap the original implementation had: a frame split across two `read`s
/// is reassembled instead of silently truncated.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        FrameReader::default()
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut frame = std::mem::replace(&mut self.buf, rest);
            frame.pop(); // drop the trailing '\n'
            frames.push(frame);
        }

        frames
    }
}

/// A registration parsed off the subscriber port:
/// `<filter>|<host>:<port>|<mode>`.
#[derive(Debug, Clone)]
pub struct SubscriberRegistration {
    pub filter: Topic,
    pub host: String,
    pub port: u16,
    pub persistent: bool,
}

/// Parses one publisher frame: `<topic>|<value>`. Exactly one `|` is
/// required; the value is everything after it, verbatim and not
/// required to be UTF-8 (only the topic half is textual).
pub fn parse_publisher_frame(frame: &[u8]) -> Result<(Topic, Vec<u8>), BrokerError> {
    let first_sep = frame
        .iter()
        .position(|&b| b == b'|')
        .ok_or_else(|| BrokerError::MalformedFrame(format!("missing '|' separator in {:?}", String::from_utf8_lossy(frame))))?;

    let (topic_bytes, rest) = frame.split_at(first_sep);
    let value_bytes = &rest[1..];

    if topic_bytes.is_empty() {
        return Err(BrokerError::MalformedFrame("missing topic".to_owned()));
    }
    if value_bytes.contains(&b'|') {
        return Err(BrokerError::MalformedFrame(format!(
            "more than one '|' separator in {:?}",
            String::from_utf8_lossy(frame)
        )));
    }

    let topic_text = std::str::from_utf8(topic_bytes)
        .map_err(|_| BrokerError::MalformedFrame("topic is not valid UTF-8".to_owned()))?;
    let topic = Topic::parse(topic_text)?;
    Ok((topic, value_bytes.to_vec()))
}

/// Parses one subscriber registration line:
/// `<filter>|<host>:<port>|<mode>`, where `<mode>` is `p` or `-`.
///
/// The two-`|`-part legacy form without a mode (`<filter>|<host>:<port>`)
/// is rejected; see SPEC_FULL.md §9 for why the three-part form was chosen.
pub fn parse_registration(line: &str) -> Result<SubscriberRegistration, BrokerError> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() != 3 {
        return Err(BrokerError::MalformedFrame(format!(
            "expected 3 '|'-separated parts, got {}: {line:?}",
            parts.len()
        )));
    }

    let filter = Topic::parse(parts[0])?;

    let (host, port) = parts[1]
        .rsplit_once(':')
        .ok_or_else(|| BrokerError::MalformedFrame(format!("expected host:port in {:?}", parts[1])))?;
    let port: u16 = port
        .parse()
        .map_err(|_| BrokerError::MalformedFrame(format!("invalid port {port:?}")))?;

    let persistent = match parts[2] {
        "p" => true,
        "-" => false,
        other => {
            return Err(BrokerError::MalformedFrame(format!(
                "invalid mode {other:?}, expected \"p\" or \"-\""
            )))
        }
    };

    Ok(SubscriberRegistration {
        filter,
        host: host.to_owned(),
        port,
        persistent,
    })
}

/// Formats the exact frame a subscriber receives on push:
/// `(topic: <topic>, value: "<value>")`.
pub fn format_push(topic: &Topic, value: &[u8]) -> String {
    format!("(topic: {}, value: \"{}\")", topic, String::from_utf8_lossy(value))
}
