use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::events::bus::{EventBus, ListenerId};
use crate::models::config::{CaptureConfiguration, CaptureOptions, SessionSettings};
use crate::models::error::{CaptureError, EventError, FlagStoreError, SessionError};
use crate::models::events::{AudioEvent, EventKind};
use crate::models::state::SessionState;
use crate::session::delegate::{SessionDelegate, SessionInner};
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::kill_flag_store::KillFlagStore;

/// Acknowledgment returned by `stop()` when nothing was recording.
pub const ACK_NOT_RECORDING: &str = "NotRecording";
/// Acknowledgment returned by `stop()` while another stop is still running.
pub const ACK_STOP_PENDING: &str = "Stopping";

/// Host-facing live audio session.
///
/// Owns the lifecycle state machine and the event bus, and drives a
/// [`CaptureBackend`]. One session per process is the expected usage, but
/// nothing prevents independent sessions (e.g. over test doubles).
///
/// ```text
/// host ── init/start/stop ──► LiveAudioSession ──► CaptureBackend
///  ▲                               │                     │
///  └──────── EventBus ◄── SessionDelegate ◄── events ────┘
/// ```
///
/// `start` and `stop` are the only async operations. A pending `start`
/// cannot be aborted: `stop` returns [`SessionError::StartInFlight`] until
/// it resolves. `stop` needs a Tokio runtime with the time driver enabled.
pub struct LiveAudioSession<B: CaptureBackend> {
    backend: B,
    bus: Arc<EventBus>,
    inner: Arc<Mutex<SessionInner>>,
    kill_flag: Option<Arc<dyn KillFlagStore>>,
    settings: SessionSettings,
}

impl<B: CaptureBackend> LiveAudioSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_settings(backend, SessionSettings::default())
    }

    pub fn with_settings(backend: B, settings: SessionSettings) -> Self {
        let kill_flag = backend.kill_flag_store();
        let bus = Arc::new(if kill_flag.is_some() {
            EventBus::with_service_state()
        } else {
            EventBus::new()
        });
        let inner = Arc::new(Mutex::new(SessionInner::new()));

        backend.attach(Arc::new(SessionDelegate::new(
            Arc::clone(&bus),
            Arc::clone(&inner),
        )));

        Self {
            backend,
            bus,
            inner,
            kill_flag,
            settings,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    /// Validated configuration with the format defaults applied.
    ///
    /// Optional fields keep the host's values; the `effective_*` accessors
    /// on [`CaptureConfiguration`] resolve them.
    pub fn configuration(&self) -> Option<CaptureConfiguration> {
        self.inner.lock().config.clone()
    }

    /// Identifier of the current recording, for log correlation.
    pub fn recording_id(&self) -> Option<Uuid> {
        self.inner.lock().recording_id
    }

    /// Whether `serviceState` events and the kill flag are available.
    pub fn supports_background_service(&self) -> bool {
        self.kill_flag.is_some()
    }

    // --- Lifecycle ---

    /// Validate `options` and hand them to the backend.
    ///
    /// Does not stop a running recording; the new configuration applies to
    /// the next `start`.
    pub fn init(&self, options: &CaptureOptions) -> Result<(), SessionError> {
        let config = options.validate()?;
        self.apply_config(config)
    }

    /// Restore the default format, keeping the configured output file.
    pub fn reset_config(&self) -> Result<(), SessionError> {
        let wav_file = {
            let inner = self.inner.lock();
            match (inner.state, inner.config.as_ref()) {
                (SessionState::Idle, Some(config)) => config.wav_file.clone(),
                (SessionState::Uninitialized, _) | (_, None) => {
                    return Err(SessionError::NotInitialized)
                }
                (state, _) => return Err(SessionError::InvalidState(state)),
            }
        };
        self.apply_config(CaptureConfiguration::with_defaults(wav_file))
    }

    fn apply_config(&self, config: CaptureConfiguration) -> Result<(), SessionError> {
        self.backend.init(&config).map_err(SessionError::InitFailed)?;

        let mut inner = self.inner.lock();
        if !inner.state.is_initialized() {
            inner.state = SessionState::Idle;
        }
        log::info!("session configured: {} (state: {})", config, inner.state.as_str());
        inner.config = Some(config);
        Ok(())
    }

    /// Start recording. Transitions: idle → recording.
    ///
    /// Resolves with the backend acknowledgment once capture is running.
    /// On failure the session returns to idle.
    pub async fn start(&self) -> Result<String, SessionError> {
        let recording_id = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Uninitialized => return Err(SessionError::NotInitialized),
                SessionState::Recording if inner.start_pending => {
                    return Err(SessionError::StartInFlight)
                }
                SessionState::Recording => return Err(SessionError::AlreadyRecording),
                SessionState::Stopping => return Err(SessionError::StopInProgress),
                SessionState::Idle => {}
            }
            let id = Uuid::new_v4();
            inner.state = SessionState::Recording;
            inner.start_pending = true;
            inner.ended_during_start = false;
            inner.recording_id = Some(id);
            id
        };

        log::info!("starting recording {}", recording_id);
        let guard = TransitionGuard::new(&self.inner, "start").aborting(&self.backend);
        let result = self.backend.start().await;
        guard.disarm();

        let mut inner = self.inner.lock();
        inner.start_pending = false;
        match result {
            Ok(ack) => {
                if inner.ended_during_start {
                    log::info!("recording {} ended while starting", recording_id);
                    inner.settle_idle();
                }
                Ok(ack)
            }
            Err(e) => {
                log::warn!("recording {} failed to start: {}", recording_id, e);
                inner.settle_idle();
                Err(SessionError::StartFailed(e))
            }
        }
    }

    /// Stop recording. Transitions: recording → stopping → idle.
    ///
    /// Safe to call repeatedly: when nothing is recording it resolves with
    /// [`ACK_NOT_RECORDING`]. If the backend fails or exceeds
    /// `stop_timeout`, an error event is emitted, the session still
    /// returns to idle, and the call fails with [`SessionError::StopFailed`].
    pub async fn stop(&self) -> Result<String, SessionError> {
        let recording_id = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Uninitialized | SessionState::Idle => {
                    log::debug!("stop ignored: not recording");
                    return Ok(ACK_NOT_RECORDING.to_string());
                }
                SessionState::Stopping => {
                    log::debug!("stop ignored: already stopping");
                    return Ok(ACK_STOP_PENDING.to_string());
                }
                SessionState::Recording if inner.start_pending => {
                    return Err(SessionError::StartInFlight)
                }
                SessionState::Recording => {
                    inner.state = SessionState::Stopping;
                    inner.recording_id
                }
            }
        };

        let guard = TransitionGuard::new(&self.inner, "stop");
        let outcome = tokio::time::timeout(self.settings.stop_timeout, self.backend.stop()).await;
        guard.disarm();

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(CaptureError::Timeout),
        };
        self.inner.lock().settle_idle();

        let id = recording_id.map(|id| id.to_string()).unwrap_or_default();
        match result {
            Ok(ack) => {
                log::info!("recording {} stopped", id);
                Ok(ack)
            }
            Err(e) => {
                log::error!("recording {} did not stop cleanly: {}", id, e);
                self.bus
                    .emit(AudioEvent::error(format!("failed to stop recording: {}", e)));
                Err(SessionError::StopFailed(e))
            }
        }
    }

    // --- Events ---

    /// Listen to `kind`, replacing any listener registered before.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Result<ListenerId, EventError>
    where
        F: Fn(&AudioEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, callback)
    }

    /// Listen to `kind` alongside existing listeners.
    pub fn add_listener<F>(&self, kind: EventKind, callback: F) -> Result<ListenerId, EventError>
    where
        F: Fn(&AudioEvent) + Send + Sync + 'static,
    {
        self.bus.add_listener(kind, callback)
    }

    /// Remove every listener of `kind`.
    pub fn remove_listener(&self, kind: EventKind) -> Result<(), EventError> {
        self.bus.unsubscribe(kind)
    }

    pub fn remove_all_listeners(&self) {
        self.bus.unsubscribe_all();
    }

    // --- Kill flag ---

    pub async fn consume_was_killed_flag(&self) -> Result<bool, FlagStoreError> {
        self.consume_was_killed_flag_sync()
    }

    pub fn consume_was_killed_flag_sync(&self) -> Result<bool, FlagStoreError> {
        self.kill_flag()?.consume()
    }

    pub fn was_killed_flag_sync(&self) -> Result<bool, FlagStoreError> {
        self.kill_flag()?.peek()
    }

    pub fn clear_was_killed_flag_sync(&self) -> Result<(), FlagStoreError> {
        self.kill_flag()?.clear()
    }

    fn kill_flag(&self) -> Result<&Arc<dyn KillFlagStore>, FlagStoreError> {
        self.kill_flag.as_ref().ok_or(FlagStoreError::Unsupported)
    }
}

/// Returns the session to idle if an in-flight start/stop future is dropped.
///
/// For `start`, the backend is aborted first so no capture outlives the
/// session's idea of it.
struct TransitionGuard<'a> {
    inner: &'a Mutex<SessionInner>,
    operation: &'static str,
    backend: Option<&'a dyn CaptureBackend>,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    fn new(inner: &'a Mutex<SessionInner>, operation: &'static str) -> Self {
        Self {
            inner,
            operation,
            backend: None,
            armed: true,
        }
    }

    fn aborting(mut self, backend: &'a dyn CaptureBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("{} abandoned before completion, session idle", self.operation);
            if let Some(backend) = self.backend {
                backend.abort();
            }
            self.inner.lock().settle_idle();
        }
    }
}
