/// The unit parsed off the wire: an event type (defaulting to `message`)
/// and one data payload line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub event_type: String,
    pub data: String,
}

pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Incremental parser for the SSE-like reply stream.
///
/// Feed it raw body chunks as they arrive; it buffers any trailing
/// incomplete line and re-prepends it to the next chunk. An `event:` line
/// governs exactly one following `data:` line, after which the current
/// event type resets to `message`. Blank lines and `:` comment lines are
/// skipped.
#[derive(Debug, Default)]
pub struct FrameParser {
    carry: Vec<u8>,
    event_type: Option<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one body chunk, returning every frame completed by it.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        self.carry.extend_from_slice(chunk);

        while let Some(newline_index) = self.carry.iter().position(|byte| *byte == b'\n') {
            let mut line = self.carry.drain(..=newline_index).collect::<Vec<_>>();
            if matches!(line.last(), Some(b'\n')) {
                line.pop();
            }
            if matches!(line.last(), Some(b'\r')) {
                line.pop();
            }
            if let Some(frame) = self.parse_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flushes the buffered trailing line once the stream has ended.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        if self.carry.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.carry);
        self.parse_line(&line).into_iter().collect()
    }

    fn parse_line(&mut self, line: &[u8]) -> Option<StreamFrame> {
        let line = String::from_utf8_lossy(line);
        let line = line.as_ref();

        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.event_type = Some(value.trim().to_string());
            return None;
        }

        if let Some(payload) = line.strip_prefix("data:") {
            // One optional space after the colon, per SSE convention.
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            let event_type = self
                .event_type
                .take()
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string());
            return Some(StreamFrame {
                event_type,
                data: payload.to_string(),
            });
        }

        // Unknown field names carry nothing in this protocol.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(chunks: &[&str]) -> Vec<StreamFrame> {
        let mut parser = FrameParser::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(parser.push_chunk(chunk.as_bytes()));
        }
        frames.extend(parser.finish());
        frames
    }

    #[test]
    fn test_data_line_defaults_to_message_type() {
        let frames = parse_all(&["data: hello\n"]);
        assert_eq!(
            frames,
            vec![StreamFrame {
                event_type: "message".into(),
                data: "hello".into(),
            }]
        );
    }

    #[test]
    fn test_event_line_governs_exactly_one_data_line() {
        let frames = parse_all(&[
            "event: progress\ndata: {\"content\":\"a\"}\ndata: plain\n",
        ]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_type, "progress");
        assert_eq!(frames[1].event_type, "message");
    }

    #[test]
    fn test_partial_line_across_chunks_parses_identically() {
        let split = parse_all(&["data:{\"content\":\"ab", "c\"}\n"]);
        let whole = parse_all(&["data:{\"content\":\"abc\"}\n"]);
        assert_eq!(split, whole);
        assert_eq!(split[0].data, "{\"content\":\"abc\"}");
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let frames = parse_all(&[": keep-alive\n\n\ndata: x\n: another comment\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_crlf_line_endings() {
        let frames = parse_all(&["event: thinking\r\ndata: {\"status\":\"queued\"}\r\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "thinking");
        assert_eq!(frames[0].data, "{\"status\":\"queued\"}");
    }

    #[test]
    fn test_trailing_line_without_newline_is_flushed() {
        let mut parser = FrameParser::new();
        assert!(parser.push_chunk(b"data: tail").is_empty());
        let frames = parser.finish();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "tail");
    }

    #[test]
    fn test_event_type_split_across_chunks() {
        let frames = parse_all(&["even", "t: progress\ndat", "a: x\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "progress");
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_unknown_field_lines_are_ignored() {
        let frames = parse_all(&["id: 7\nretry: 100\ndata: y\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "y");
    }
}
