use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::events::bus::EventBus;
use crate::models::config::CaptureConfiguration;
use crate::models::events::{AudioEvent, ServiceStatus, ServiceStateChange};
use crate::models::state::SessionState;
use crate::traits::capture_delegate::CaptureDelegate;

/// Mutable session state shared between the session and its delegate.
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) config: Option<CaptureConfiguration>,
    pub(crate) start_pending: bool,
    /// Set when the backend reports that capture ended while a start was pending.
    pub(crate) ended_during_start: bool,
    pub(crate) recording_id: Option<Uuid>,
}

impl SessionInner {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            config: None,
            start_pending: false,
            ended_during_start: false,
            recording_id: None,
        }
    }

    pub(crate) fn settle_idle(&mut self) {
        self.state = SessionState::Idle;
        self.start_pending = false;
        self.recording_id = None;
    }
}

/// Forwards backend notifications to the bus and keeps the state machine
/// in step with capture that ends on its own.
pub(crate) struct SessionDelegate {
    bus: Arc<EventBus>,
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionDelegate {
    pub(crate) fn new(bus: Arc<EventBus>, inner: Arc<Mutex<SessionInner>>) -> Self {
        Self { bus, inner }
    }

    /// Capture ended without a `stop()` from the host.
    fn capture_ended(&self, cause: &str) {
        let mut inner = self.inner.lock();
        if !inner.state.is_recording() {
            return;
        }
        if inner.start_pending {
            inner.ended_during_start = true;
            return;
        }
        log::info!(
            "recording {} ended ({}), session idle",
            inner.recording_id.map(|id| id.to_string()).unwrap_or_default(),
            cause
        );
        inner.settle_idle();
    }
}

impl CaptureDelegate for SessionDelegate {
    fn on_data(&self, payload: String) {
        self.bus.emit(AudioEvent::Data(payload));
    }

    fn on_recording_state(&self, is_recording: bool) {
        if !is_recording {
            self.capture_ended("recording state");
        }
        self.bus.emit(AudioEvent::RecordingState { is_recording });
    }

    fn on_error(&self, message: &str) {
        log::debug!("capture error: {}", message);
        self.bus.emit(AudioEvent::error(message));
    }

    fn on_service_state(&self, change: ServiceStateChange) {
        if change.state == ServiceStatus::Stopped {
            let cause = change
                .reason
                .as_ref()
                .map_or("service stopped", |reason| reason.as_str());
            self.capture_ended(cause);
        }
        self.bus.emit(AudioEvent::ServiceState(change));
    }

    fn on_capture_failed(&self, message: &str) {
        log::warn!("capture failed: {}", message);
        self.capture_ended(message);
        self.bus.emit(AudioEvent::error(message));
    }
}
