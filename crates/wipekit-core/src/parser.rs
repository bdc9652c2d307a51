/// Incremental JSON event parser.
///
/// The engine writes one JSON object per logical line, but pipe reads hand
/// us arbitrary byte chunks that rarely align with object boundaries. The
/// parser keeps a single growing buffer plus a string-aware brace-depth
/// counter: a `{` or `}` inside a quoted string (escaped quotes included)
/// never affects depth. Whenever depth returns to zero the candidate span
/// is cut out, parsed, classified, and emitted; malformed spans are logged
/// and skipped — one bad event must never abort the stream.
///
/// One parser instance is bound to one process's lifetime; [`EventParser::clear`]
/// resets it when the operation's handle is released.
use crate::model::{SystemReport, WipeEvent};
use serde_json::Value;
use tracing::warn;

/// Stateful reassembler of fragmented JSON events.
#[derive(Debug, Default)]
pub struct EventParser {
    buf: String,
    /// Byte offset up to which `buf` has already been scanned.
    scan_pos: usize,
    /// Byte offset of the current top-level `{`, when inside an object.
    obj_start: Option<usize>,
    depth: u32,
    in_string: bool,
    escaped: bool,
    /// Undecoded bytes held back by [`EventParser::push_bytes`] — at most an
    /// incomplete trailing UTF-8 sequence.
    pending: Vec<u8>,
    /// Count of malformed spans discarded so far, for diagnostics.
    discarded: u64,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of malformed spans discarded since construction / last clear.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Reset all state. Called when the owning operation's handle is released.
    pub fn clear(&mut self) {
        *self = Self {
            discarded: self.discarded,
            ..Self::default()
        };
    }

    /// Feed a raw byte chunk and collect completed events.
    ///
    /// Pipe reads split at arbitrary byte offsets, including inside a
    /// multi-byte UTF-8 sequence. An incomplete trailing sequence is held
    /// back until the next chunk completes it; only genuinely invalid bytes
    /// are replaced lossily.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<WipeEvent> {
        self.pending.extend_from_slice(chunk);

        let valid_len = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) => match err.error_len() {
                // Truncated sequence at the tail — wait for the rest.
                None => err.valid_up_to(),
                // Invalid bytes mid-stream: decode lossily and move on.
                Some(_) => {
                    let text = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return self.push(&text);
                }
            },
        };

        let text = String::from_utf8_lossy(&self.pending[..valid_len]).into_owned();
        self.pending.drain(..valid_len);
        self.push(&text)
    }

    /// Feed a text chunk and collect every event completed by it, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<WipeEvent> {
        self.buf.push_str(chunk);
        let mut events = Vec::new();

        // Continue the scan exactly where the previous push stopped; the
        // string/escape/depth state survives across chunk boundaries.
        let bytes = self.buf.as_bytes().to_vec();

        let mut i = self.scan_pos;
        while i < bytes.len() {
            let b = bytes[i];

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                i += 1;
                continue;
            }

            match b {
                b'"' if self.depth > 0 => self.in_string = true,
                b'{' => {
                    if self.depth == 0 {
                        self.obj_start = Some(i);
                    }
                    self.depth += 1;
                }
                b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        if let Some(start) = self.obj_start.take() {
                            let span = &self.buf[start..=i];
                            match classify(span) {
                                Some(event) => events.push(event),
                                None => self.discarded += 1,
                            }
                        }
                    }
                }
                // Anything between objects (newlines, stray text) is noise
                // and is dropped with the consumed prefix below.
                _ => {}
            }
            i += 1;
        }

        // Drop the consumed prefix: keep only the incomplete object tail,
        // or nothing when the scan ended between objects.
        let retain_from = self.obj_start.unwrap_or(self.buf.len());
        self.buf.drain(..retain_from);
        if let Some(start) = self.obj_start.as_mut() {
            *start -= retain_from;
        }
        self.scan_pos = self.buf.len();

        events
    }
}

/// Parse and classify one candidate span. `None` means malformed (logged).
fn classify(span: &str) -> Option<WipeEvent> {
    let value: Value = match serde_json::from_str(span) {
        Ok(v) => v,
        Err(err) => {
            warn!("discarding malformed event ({err}): {span}");
            return None;
        }
    };

    // The system-information payload is flat and has no discriminator; it
    // is identified by its simultaneous OS fields.
    if let Some(obj) = value.as_object() {
        if obj.contains_key("os_name")
            && obj.contains_key("os_version")
            && obj.contains_key("architecture")
        {
            return match serde_json::from_value::<SystemReport>(value) {
                Ok(report) => Some(WipeEvent::SystemInfo(report)),
                Err(err) => {
                    warn!("discarding malformed system report ({err})");
                    None
                }
            };
        }
    }

    match serde_json::from_value::<WipeEvent>(value) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!("discarding event with unknown shape ({err}): {span}");
            None
        }
    }
}
