use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::processing::ring_buffer::RingBuffer;

/// Receiving end for PCM frames produced by a [`CaptureProvider`].
///
/// Cheap to clone; every clone feeds the same buffer. Frames are already
/// encoded in the configured sample format.
#[derive(Clone)]
pub struct FrameSink {
    buffer: Arc<Mutex<RingBuffer<u8>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl FrameSink {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(RingBuffer::new(capacity_bytes))),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Append captured bytes. Overflow drops the oldest audio.
    pub fn push(&self, pcm: &[u8]) {
        let dropped = self.buffer.lock().write(pcm);
        if dropped > 0 {
            log::warn!("frame buffer overflow, dropped {} bytes", dropped);
        }
    }

    /// Report that capture cannot continue. The first failure wins.
    pub fn fail(&self, message: impl Into<String>) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(message.into());
        }
    }

    /// Take the pending failure, if any.
    pub fn take_failure(&self) -> Option<String> {
        self.failure.lock().take()
    }

    /// Remove the next complete chunk of `chunk_size` bytes.
    pub fn next_chunk(&self, chunk_size: usize) -> Option<Vec<u8>> {
        self.buffer.lock().read_exact(chunk_size)
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.lock().count()
    }
}

/// Platform PCM source used by the background recording service.
///
/// The provider owns the actual microphone; it delivers encoded PCM to the
/// [`FrameSink`] from its own thread.
pub trait CaptureProvider: Send {
    /// Whether a capture device is present.
    fn is_available(&self) -> bool;

    /// Whether the host granted the record-audio permission.
    fn has_permission(&self) -> bool {
        true
    }

    /// Open the device with `config` and begin delivering frames to `sink`.
    fn start(&mut self, config: &CaptureConfiguration, sink: FrameSink) -> Result<(), CaptureError>;

    /// Stop delivering frames and release the device. Calling it on a
    /// stopped provider is a no-op.
    fn stop(&mut self) -> Result<(), CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_buffer() {
        let sink = FrameSink::new(16);
        let producer = sink.clone();

        producer.push(&[1, 2, 3, 4, 5]);
        assert_eq!(sink.buffered_bytes(), 5);
        assert_eq!(sink.next_chunk(4), Some(vec![1, 2, 3, 4]));
        assert_eq!(sink.next_chunk(4), None);
    }

    #[test]
    fn first_failure_wins_and_is_taken_once() {
        let sink = FrameSink::new(4);
        sink.fail("device unplugged");
        sink.fail("read error");

        assert_eq!(sink.take_failure().as_deref(), Some("device unplugged"));
        assert_eq!(sink.take_failure(), None);
    }
}
