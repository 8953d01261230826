use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::EventError;

/// Wire names of the event kinds, as seen by a host bridge.
pub mod wire {
    pub const DATA: &str = "data";
    pub const RECORDING_STATE: &str = "recordingState";
    pub const ERROR: &str = "error";
    /// Only delivered by backends that run as a background service.
    pub const SERVICE_STATE: &str = "serviceState";
}

/// Notification channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Data,
    RecordingState,
    Error,
    ServiceState,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        Self::Data,
        Self::RecordingState,
        Self::Error,
        Self::ServiceState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => wire::DATA,
            Self::RecordingState => wire::RECORDING_STATE,
            Self::Error => wire::ERROR,
            Self::ServiceState => wire::SERVICE_STATE,
        }
    }

    /// Whether the kind only exists on background-service backends.
    pub fn requires_background_service(&self) -> bool {
        matches!(self, Self::ServiceState)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventError::InvalidEventKind {
                kind: s.to_string(),
                available: available_kinds(&Self::ALL),
            })
    }
}

pub(crate) fn available_kinds(kinds: &[EventKind]) -> String {
    kinds
        .iter()
        .map(EventKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Lifecycle state reported by a background service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Started,
    Stopped,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

/// Why a background service stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopReason {
    /// Explicit `stop()` from the host.
    ActionStop,
    /// The user swiped the app away from the task list.
    TaskRemoved,
    /// The service was torn down while still recording.
    Destroy,
    /// A previous process died without any teardown running.
    ProcessKilled,
    /// Platform- or vendor-specific reason.
    Other(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ActionStop => "action_stop",
            Self::TaskRemoved => "task_removed",
            Self::Destroy => "destroy",
            Self::ProcessKilled => "process_killed",
            Self::Other(reason) => reason,
        }
    }

    /// Whether the stop was requested by the host rather than imposed.
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::ActionStop)
    }
}

impl From<&str> for StopReason {
    fn from(s: &str) -> Self {
        match s {
            "action_stop" => Self::ActionStop,
            "task_removed" => Self::TaskRemoved,
            "destroy" => Self::Destroy,
            "process_killed" => Self::ProcessKilled,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for StopReason {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<StopReason> for String {
    fn from(reason: StopReason) -> Self {
        reason.as_str().to_string()
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `serviceState` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStateChange {
    pub state: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
}

impl ServiceStateChange {
    pub fn stopped(reason: StopReason) -> Self {
        Self {
            state: ServiceStatus::Stopped,
            reason: Some(reason),
        }
    }
}

/// A notification delivered through the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// Base64-encoded PCM chunk.
    Data(String),
    RecordingState { is_recording: bool },
    Error { message: String },
    ServiceState(ServiceStateChange),
}

impl AudioEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::RecordingState { .. } => EventKind::RecordingState,
            Self::Error { .. } => EventKind::Error,
            Self::ServiceState(_) => EventKind::ServiceState,
        }
    }

    /// Payload in the shape a JavaScript host expects for this event.
    pub fn payload_json(&self) -> Value {
        match self {
            Self::Data(data) => Value::String(data.clone()),
            Self::RecordingState { is_recording } => json!({ "isRecording": is_recording }),
            Self::Error { message } => json!({ "error": message }),
            Self::ServiceState(change) => serde_json::to_value(change).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(EventKind::RecordingState.to_string(), "recordingState");
    }

    #[test]
    fn unknown_wire_name_lists_available_events() {
        let err = "volume".parse::<EventKind>().unwrap_err();
        assert_eq!(
            err,
            EventError::InvalidEventKind {
                kind: "volume".into(),
                available: "data, recordingState, error, serviceState".into(),
            }
        );
        assert!(err.to_string().starts_with("invalid event `volume`"));
    }

    #[test]
    fn payloads_match_host_shapes() {
        assert_eq!(AudioEvent::Data("AAEC".into()).payload_json(), json!("AAEC"));
        assert_eq!(
            AudioEvent::RecordingState { is_recording: true }.payload_json(),
            json!({ "isRecording": true })
        );
        assert_eq!(
            AudioEvent::error("boom").payload_json(),
            json!({ "error": "boom" })
        );
        assert_eq!(
            AudioEvent::ServiceState(ServiceStateChange::stopped(StopReason::TaskRemoved))
                .payload_json(),
            json!({ "state": "stopped", "reason": "task_removed" })
        );
        assert_eq!(
            AudioEvent::ServiceState(ServiceStateChange {
                state: ServiceStatus::Started,
                reason: None,
            })
            .payload_json(),
            json!({ "state": "started" })
        );
    }

    #[test]
    fn vendor_stop_reasons_are_preserved() {
        let reason = StopReason::from("oem_battery_saver");
        assert_eq!(reason, StopReason::Other("oem_battery_saver".into()));
        assert_eq!(reason.as_str(), "oem_battery_saver");
        assert!(!reason.is_explicit());
        assert!(StopReason::from("action_stop").is_explicit());
    }
}
