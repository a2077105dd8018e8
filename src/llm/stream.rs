/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes arrive in arbitrary chunks; only complete events are emitted, with the
/// payload of consecutive `data:` lines joined by newlines.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    // Prefix of `pending` already known to hold no newline.
    scanned: usize,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut line_start = 0;

        while let Some(offset) = self.pending[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let newline = self.scanned + offset;
            let mut line_end = newline;
            if line_end > line_start && self.pending[line_end - 1] == b'\r' {
                line_end -= 1;
            }
            let line = String::from_utf8_lossy(&self.pending[line_start..line_end]).into_owned();
            line_start = newline + 1;
            self.scanned = line_start;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        self.pending.drain(..line_start);
        self.scanned = self.pending.len();
        events
    }

    /// Flushes a trailing event when the body does not end with a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.scanned = 0;
            let line = line.trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let event = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_split_across_chunks_are_reassembled() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        assert!(decoder.push(b" 1}\r\n").is_empty());
        let events = decoder.push(b"\r\ndata: {\"b\": 2}\n\n");
        assert_eq!(events, vec!["{\"a\": 1}".to_string(), "{\"b\": 2}".to_string()]);
    }

    #[test]
    fn comments_and_other_fields_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keepalive\nevent: message\nid: 7\ndata: x\n\n");
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: first\ndata: second\n\n");
        assert_eq!(events, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn long_line_in_small_chunks_is_scanned_once() {
        let mut decoder = SseDecoder::new();
        let payload = "A".repeat(64 * 1024);
        let body = format!("data: {payload}\r\n\r\ndata: next\n\n");
        let mut events = Vec::new();
        for chunk in body.as_bytes().chunks(7) {
            events.extend(decoder.push(chunk));
            assert_eq!(decoder.scanned, decoder.pending.len());
        }
        assert_eq!(events, vec![payload, "next".to_string()]);
        assert!(decoder.pending.is_empty());
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let text = "data: café\n\n".as_bytes();
        let split = text.iter().position(|byte| *byte == 0xC3).unwrap() + 1;
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec!["café".to_string()]);
    }
}
