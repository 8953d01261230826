//! # live-audio-service
//!
//! Background recording service backend for live-audio-core.
//!
//! Provides:
//! - `BackgroundRecordingService`: `CaptureBackend` that records on a dedicated service thread
//! - `ChunkEncoder`: start-click skipping and base64 encoding of PCM chunks
//! - `ServiceJournal`: active-recording marker used to detect a hard kill
//! - `ServiceSettings`: poll interval, buffering, leading chunks to skip
//!
//! The platform microphone is plugged in through `CaptureProvider`.
//!
//! ## Usage
//! ```ignore
//! use live_audio_core::{CaptureOptions, EventKind, LiveAudioSession};
//! use live_audio_service::BackgroundRecordingService;
//!
//! let service = BackgroundRecordingService::in_dir(provider, state_dir);
//! let session = LiveAudioSession::new(service);
//! session.init(&CaptureOptions::new("take.wav"))?;
//! session.on(EventKind::Data, |event| forward(event))?;
//! session.start().await?;
//! ```

pub mod encoder;
pub mod journal;
pub mod service;
pub mod settings;

#[cfg(test)]
mod test_support;

pub use encoder::ChunkEncoder;
pub use journal::{JournalEntry, JournalError, ServiceJournal};
pub use service::{BackgroundRecordingService, ACK_STARTED, ACK_STOPPED};
pub use settings::ServiceSettings;
