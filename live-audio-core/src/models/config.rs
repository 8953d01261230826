use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_CHANNELS: u16 = 1;
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;
/// Platform code for the voice-recognition capture source.
pub const VOICE_RECOGNITION_SOURCE: i32 = 6;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;
pub const DEFAULT_NOTIFICATION_TITLE: &str = "Audio Recording";
pub const DEFAULT_NOTIFICATION_CONTENT: &str = "Recording audio in background";

/// Supported capture sample rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum SampleRate {
    #[default]
    Hz44100,
    Hz22050,
    Hz16000,
    Hz11025,
}

impl SampleRate {
    pub const ALL: [SampleRate; 4] = [Self::Hz44100, Self::Hz22050, Self::Hz16000, Self::Hz11025];

    pub fn hz(self) -> u32 {
        match self {
            Self::Hz44100 => 44_100,
            Self::Hz22050 => 22_050,
            Self::Hz16000 => 16_000,
            Self::Hz11025 => 11_025,
        }
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.hz()
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|rate| rate.hz() == value)
            .ok_or(ConfigError::InvalidEnumValue {
                field: "sampleRate",
                value: i64::from(value),
            })
    }
}

/// Input channel layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ChannelCount {
    #[default]
    Mono,
    Stereo,
}

impl ChannelCount {
    pub fn count(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

impl From<ChannelCount> for u16 {
    fn from(channels: ChannelCount) -> Self {
        channels.count()
    }
}

impl TryFrom<u16> for ChannelCount {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            other => Err(ConfigError::InvalidEnumValue {
                field: "channels",
                value: i64::from(other),
            }),
        }
    }
}

/// PCM sample width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum BitsPerSample {
    Eight,
    #[default]
    Sixteen,
}

impl BitsPerSample {
    pub fn bits(self) -> u16 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    pub fn bytes(self) -> usize {
        usize::from(self.bits() / 8)
    }
}

impl From<BitsPerSample> for u16 {
    fn from(bits: BitsPerSample) -> Self {
        bits.bits()
    }
}

impl TryFrom<u16> for BitsPerSample {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(ConfigError::InvalidEnumValue {
                field: "bitsPerSample",
                value: i64::from(other),
            }),
        }
    }
}

/// Capture request as supplied by the host.
///
/// Every field is optional on input so that a partially filled request can be
/// deserialized and reported precisely by [`CaptureOptions::validate`].
/// Numeric fields are kept wide so out-of-range values reach the validator
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureOptions {
    pub sample_rate: Option<i64>,
    pub channels: Option<i64>,
    pub bits_per_sample: Option<i64>,
    pub audio_source: Option<i32>,
    pub wav_file: Option<String>,
    pub buffer_size: Option<usize>,
    pub notification_title: Option<String>,
    pub notification_content: Option<String>,
    pub notification_icon: Option<String>,
}

impl CaptureOptions {
    /// Options with only the required output path filled in.
    pub fn new(wav_file: impl Into<String>) -> Self {
        Self {
            wav_file: Some(wav_file.into()),
            ..Default::default()
        }
    }

    /// Parse the camelCase JSON object a host bridge hands over.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Apply defaults and check every enumerated field.
    pub fn validate(&self) -> Result<CaptureConfiguration, ConfigError> {
        let sample_rate = match self.sample_rate {
            Some(value) => u32::try_from(value)
                .map_err(|_| ConfigError::InvalidEnumValue {
                    field: "sampleRate",
                    value,
                })
                .and_then(SampleRate::try_from)?,
            None => SampleRate::default(),
        };

        let channels = match self.channels {
            Some(value) => u16::try_from(value)
                .map_err(|_| ConfigError::InvalidEnumValue {
                    field: "channels",
                    value,
                })
                .and_then(ChannelCount::try_from)?,
            None => ChannelCount::default(),
        };

        let bits_per_sample = match self.bits_per_sample {
            Some(value) => u16::try_from(value)
                .map_err(|_| ConfigError::InvalidEnumValue {
                    field: "bitsPerSample",
                    value,
                })
                .and_then(BitsPerSample::try_from)?,
            None => BitsPerSample::default(),
        };

        let wav_file = match self.wav_file.as_deref() {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => return Err(ConfigError::MissingRequiredField("wavFile")),
        };

        Ok(CaptureConfiguration {
            sample_rate,
            channels,
            bits_per_sample,
            audio_source: self.audio_source,
            wav_file,
            buffer_size: self.buffer_size,
            notification_title: self.notification_title.clone(),
            notification_content: self.notification_content.clone(),
            notification_icon: self.notification_icon.clone(),
        })
    }
}

/// Validated capture configuration handed to the capture backend.
///
/// Optional fields are stored exactly as the host passed them; the
/// `effective_*` accessors resolve the values the recording service uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfiguration {
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
    pub bits_per_sample: BitsPerSample,
    pub audio_source: Option<i32>,
    pub wav_file: PathBuf,
    pub buffer_size: Option<usize>,
    pub notification_title: Option<String>,
    pub notification_content: Option<String>,
    pub notification_icon: Option<String>,
}

impl CaptureConfiguration {
    /// Default format writing to `wav_file`.
    pub fn with_defaults(wav_file: impl Into<PathBuf>) -> Self {
        Self {
            sample_rate: SampleRate::default(),
            channels: ChannelCount::default(),
            bits_per_sample: BitsPerSample::default(),
            audio_source: None,
            wav_file: wav_file.into(),
            buffer_size: None,
            notification_title: None,
            notification_content: None,
            notification_icon: None,
        }
    }

    pub fn effective_audio_source(&self) -> i32 {
        self.audio_source.unwrap_or(VOICE_RECOGNITION_SOURCE)
    }

    /// Chunk size in bytes; zero counts as unset.
    pub fn effective_buffer_size(&self) -> usize {
        match self.buffer_size {
            Some(size) if size > 0 => size,
            _ => DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn effective_notification_title(&self) -> &str {
        non_blank(self.notification_title.as_deref()).unwrap_or(DEFAULT_NOTIFICATION_TITLE)
    }

    pub fn effective_notification_content(&self) -> &str {
        non_blank(self.notification_content.as_deref()).unwrap_or(DEFAULT_NOTIFICATION_CONTENT)
    }

    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels.count()) * self.bits_per_sample.bytes()
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate.hz() as usize * self.bytes_per_frame()
    }
}

impl fmt::Display for CaptureConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit -> {}",
            self.sample_rate.hz(),
            self.channels.count(),
            self.bits_per_sample.bits(),
            self.wav_file.display()
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Session-level tuning that is not part of a capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Upper bound on how long `stop()` waits for the backend.
    #[serde(rename = "stopTimeoutMs", with = "duration_ms")]
    pub stop_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Serde adapter for durations written as integer milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
