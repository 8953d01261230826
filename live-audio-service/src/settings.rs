use std::time::Duration;

use live_audio_core::models::config::duration_ms;
use serde::Deserialize;

/// Tuning for the background recording service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSettings {
    /// How often the worker drains the frame buffer.
    #[serde(rename = "pollIntervalMs", with = "duration_ms")]
    pub poll_interval: Duration,

    /// Frame buffer capacity, in seconds of audio.
    pub buffered_seconds: usize,

    /// Chunks discarded at the start of every recording (device start-up click).
    pub skip_leading_chunks: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            buffered_seconds: 5,
            skip_leading_chunks: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: ServiceSettings =
            serde_json::from_str(r#"{"pollIntervalMs": 5, "skipLeadingChunks": 0}"#).unwrap();

        assert_eq!(settings.poll_interval, Duration::from_millis(5));
        assert_eq!(settings.skip_leading_chunks, 0);
        assert_eq!(settings.buffered_seconds, 5);
    }
}
