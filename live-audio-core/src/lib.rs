//! # live-audio-core
//!
//! Platform-agnostic core of a live audio capture session.
//!
//! Provides capture option validation, a typed event bus, the durable
//! "was killed" flag, and the session state machine that drives a capture
//! backend. Backends (the background recording service, test doubles)
//! implement the `CaptureBackend` trait and report through `CaptureDelegate`.
//!
//! ## Architecture
//!
//! ```text
//! live-audio-core (this crate)
//! ├── models/      ← CaptureOptions, CaptureConfiguration, SessionState, AudioEvent, errors
//! ├── events/      ← EventBus
//! ├── processing/  ← RingBuffer
//! ├── session/     ← LiveAudioSession (state machine)
//! ├── storage/     ← FileKillFlag, MemoryKillFlag
//! └── traits/      ← CaptureBackend, CaptureDelegate, CaptureProvider, KillFlagStore
//! ```

pub mod events;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use events::bus::{EventBus, Listener, ListenerId};
pub use models::config::{
    BitsPerSample, CaptureConfiguration, CaptureOptions, ChannelCount, SampleRate, SessionSettings,
};
pub use models::error::{CaptureError, ConfigError, EventError, FlagStoreError, SessionError};
pub use models::events::{wire, AudioEvent, EventKind, ServiceStateChange, ServiceStatus, StopReason};
pub use models::kill_record::KillRecord;
pub use models::state::SessionState;
pub use processing::ring_buffer::RingBuffer;
pub use session::live_session::{LiveAudioSession, ACK_NOT_RECORDING, ACK_STOP_PENDING};
pub use storage::kill_flag::{FileKillFlag, MemoryKillFlag};
pub use traits::capture_backend::CaptureBackend;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_provider::{CaptureProvider, FrameSink};
pub use traits::kill_flag_store::KillFlagStore;
