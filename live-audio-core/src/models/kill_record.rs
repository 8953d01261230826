use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::StopReason;

/// Details stored alongside a raised kill flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRecord {
    pub reason: StopReason,
    /// Recording session that was cut short, when known.
    pub session_id: Option<Uuid>,
    /// RFC 3339 timestamp of the detection.
    pub killed_at: String,
}

impl KillRecord {
    pub fn new(reason: StopReason, session_id: Option<Uuid>) -> Self {
        Self {
            reason,
            session_id,
            killed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
