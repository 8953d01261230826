use base64::Engine as _;

/// Turns fixed-size PCM chunks into `data` event payloads.
///
/// The first `skip_leading` chunks of a recording are discarded.
#[derive(Debug)]
pub struct ChunkEncoder {
    skip_remaining: usize,
    emitted: u64,
}

impl ChunkEncoder {
    pub fn new(skip_leading: usize) -> Self {
        Self {
            skip_remaining: skip_leading,
            emitted: 0,
        }
    }

    /// Base64 payload for `chunk`, or `None` while still skipping.
    pub fn encode(&mut self, chunk: &[u8]) -> Option<String> {
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            return None;
        }
        self.emitted += 1;
        Some(base64::engine::general_purpose::STANDARD.encode(chunk))
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}
