/// Incremental server-sent-events frame assembly.
///
/// Network chunks land here as they arrive; complete `\n\n`-terminated
/// frames come back out, partial frames stay buffered.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: String,
}

impl SseBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        self.buffer.push_str(&text);
    }

    pub fn next_frame(&mut self) -> Option<String> {
        let boundary = self.buffer.find("\n\n")?;
        let remaining = self.buffer.split_off(boundary + 2);
        let frame = std::mem::take(&mut self.buffer);
        self.buffer = remaining;
        Some(frame)
    }
}

/// Pairs each `event:` line with the `data:` line that follows it.
pub fn parse_event_data_pairs(frame: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut current_event = None;

    for line in frame.lines() {
        if let Some(event_name) = line.strip_prefix("event: ") {
            current_event = Some(event_name.trim());
        } else if let Some(data) = line.strip_prefix("data: ")
            && let Some(event_name) = current_event.take()
        {
            pairs.push((event_name, data.trim()));
        }
    }

    pairs
}
