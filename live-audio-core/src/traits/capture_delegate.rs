use crate::models::events::ServiceStateChange;

/// Event sink handed to a capture backend.
///
/// Methods may be called from any thread, including the backend's worker
/// thread. Calls for a given kind must be made in emission order.
pub trait CaptureDelegate: Send + Sync {
    /// A PCM chunk, already encoded for the host (base64).
    fn on_data(&self, payload: String);

    /// Capture started or ended.
    fn on_recording_state(&self, is_recording: bool);

    /// A runtime condition the host should know about. Does not end capture.
    fn on_error(&self, message: &str);

    /// Background-service lifecycle update.
    fn on_service_state(&self, change: ServiceStateChange);

    /// Capture ended on its own because of `message`.
    fn on_capture_failed(&self, message: &str);
}
