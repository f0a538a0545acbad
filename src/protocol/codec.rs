//! Frame decoding: raw bytes to `\r\n` lines to [`Event`]s.

use super::event::Event;

/// Line terminator used on the wire.
pub const TERMINATOR: &[u8] = b"\r\n";

/// Incremental line splitter for an unbounded inbound byte stream.
///
/// Bytes are buffered until a `\r\n` terminator arrives. Each call to
/// [`LineDecoder::next_line`] yields exactly one line (terminator stripped)
/// and removes it from the buffer.
///
/// # Example
///
/// ```
/// use hookbot::protocol::LineDecoder;
///
/// let mut decoder = LineDecoder::new();
/// decoder.feed(b"PING :a\r\nPI");
/// assert_eq!(decoder.next_line().as_deref(), Some("PING :a"));
/// assert_eq!(decoder.next_line(), None);
/// decoder.feed(b"NG :b\r\n");
/// assert_eq!(decoder.next_line().as_deref(), Some("PING :b"));
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    // Bytes already searched for a terminator.
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete line, if any.
    ///
    /// Invalid UTF-8 sequences are dropped.
    pub fn next_line(&mut self) -> Option<String> {
        // A terminator may straddle the previous scan boundary.
        let start = self.scanned.saturating_sub(TERMINATOR.len() - 1);
        let Some(offset) = self.buffer[start..]
            .windows(TERMINATOR.len())
            .position(|w| w == TERMINATOR)
        else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = start + offset;
        let raw: Vec<u8> = self.buffer.drain(..end + TERMINATOR.len()).collect();
        self.scanned = 0;
        Some(decode_lossy(&raw[..end]))
    }

    /// Pop and parse the next complete line, if any.
    pub fn next_event(&mut self) -> Option<Event> {
        self.next_line().map(|line| parse_line(&line))
    }
}

/// Decode UTF-8, skipping invalid sequences instead of replacing them.
fn decode_lossy(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}

/// Parse one line (without terminator) into an [`Event`].
///
/// Never fails: lines that match no known shape become `UNKNOWN` events
/// carrying the whole line as body.
pub fn parse_line(line: &str) -> Event {
    let fields: Vec<&str> = line.splitn(4, ' ').collect();
    let first = fields.first().copied().unwrap_or("");

    if let Some(origin) = first.strip_prefix(':') {
        let Some(name) = fields.get(1).filter(|n| !n.is_empty()) else {
            return Event::unknown(line);
        };
        let mut event = Event::new(*name).with_origin(origin);
        if let Some(target) = fields.get(2) {
            // JOIN/NICK and friends may send their only parameter as trailing text.
            let target = target.strip_prefix(':').unwrap_or(target);
            event = event.with_target(target);
        }
        if let Some(rest) = fields.get(3) {
            event = event.with_body(strip_colon(rest));
        }
        return event;
    }

    match first {
        "PING" => {
            let mut event = Event::new("PING");
            if let Some(token) = fields.get(1) {
                event = event.with_body(strip_colon(token));
            }
            event
        }
        "ERROR" => {
            let rest = line.split_once(' ').map(|(_, r)| r).unwrap_or("");
            Event::new("ERROR").with_body(strip_colon(rest))
        }
        _ => Event::unknown(line),
    }
}

fn strip_colon(s: &str) -> &str {
    s.strip_prefix(':').unwrap_or(s)
}
