use thiserror::Error;

use super::state::SessionState;

/// Capture option validation failures, raised synchronously by `init`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value} for `{field}`")]
    InvalidEnumValue { field: &'static str, value: i64 },

    #[error("missing required field `{0}`")]
    MissingRequiredField(&'static str),

    #[error("malformed capture options: {0}")]
    Malformed(String),
}

/// Event bus misuse, raised synchronously by subscription calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("invalid event `{kind}`. Available events are: {available}")]
    InvalidEventKind { kind: String, available: String },
}

/// Errors reported by a capture backend or a PCM provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("audio recording permission not granted")]
    PermissionDenied,

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("stream failed: {0}")]
    StreamFailed(String),

    #[error("timeout")]
    Timeout,

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Failures of the session lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session is not initialized")]
    NotInitialized,

    #[error("already recording")]
    AlreadyRecording,

    #[error("a start request is still in flight")]
    StartInFlight,

    #[error("a stop request is in progress")]
    StopInProgress,

    #[error("backend rejected configuration: {0}")]
    InitFailed(CaptureError),

    #[error("failed to start recording: {0}")]
    StartFailed(CaptureError),

    #[error("failed to stop recording: {0}")]
    StopFailed(CaptureError),

    #[error("operation not allowed in state {0:?}")]
    InvalidState(SessionState),
}

/// Kill-flag storage failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlagStoreError {
    #[error("kill flag is not supported without a background service")]
    Unsupported,

    #[error("storage error: {0}")]
    Storage(String),
}
