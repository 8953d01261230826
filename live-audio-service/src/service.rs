use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use live_audio_core::{
    CaptureBackend, CaptureConfiguration, CaptureDelegate, CaptureError, CaptureProvider,
    FileKillFlag, FrameSink, KillFlagStore, KillRecord, ServiceStateChange, StopReason,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::encoder::ChunkEncoder;
use crate::journal::{JournalEntry, JournalError, ServiceJournal};
use crate::settings::ServiceSettings;

pub const ACK_STARTED: &str = "Started";
pub const ACK_STOPPED: &str = "Stopped";

/// One recording's service thread.
struct Worker {
    session_id: Uuid,
    running: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Capture backend that records on a dedicated service thread.
///
/// The provider delivers PCM into a [`FrameSink`]; the service thread cuts it
/// into `buffer_size` chunks and forwards them as base64 `data` events. The
/// service owns a [`KillFlagStore`], so sessions built over it support
/// `serviceState` events and kill detection:
///
/// - [`on_task_removed`](Self::on_task_removed) and dropping a running
///   service end the recording and raise the flag.
/// - A journal entry left by a process that died mid-recording raises the
///   flag when the next service is constructed.
pub struct BackgroundRecordingService<P: CaptureProvider + 'static> {
    provider: Arc<Mutex<P>>,
    delegate: Mutex<Option<Arc<dyn CaptureDelegate>>>,
    config: Mutex<Option<CaptureConfiguration>>,
    kill_flag: Arc<dyn KillFlagStore>,
    journal: ServiceJournal,
    settings: ServiceSettings,
    worker: Mutex<Option<Worker>>,
    /// Held by a stop for its whole teardown; `start` waits on it.
    lifecycle: Arc<tokio::sync::Mutex<()>>,
}

impl<P: CaptureProvider + 'static> BackgroundRecordingService<P> {
    pub fn new(provider: P, kill_flag: Arc<dyn KillFlagStore>, journal: ServiceJournal) -> Self {
        Self::with_settings(provider, kill_flag, journal, ServiceSettings::default())
    }

    pub fn with_settings(
        provider: P,
        kill_flag: Arc<dyn KillFlagStore>,
        journal: ServiceJournal,
        settings: ServiceSettings,
    ) -> Self {
        let service = Self {
            provider: Arc::new(Mutex::new(provider)),
            delegate: Mutex::new(None),
            config: Mutex::new(None),
            kill_flag,
            journal,
            settings,
            worker: Mutex::new(None),
            lifecycle: Arc::new(tokio::sync::Mutex::new(())),
        };
        service.recover_abandoned_session();
        service
    }

    /// Keep the kill flag and the journal as files inside `state_dir`.
    pub fn in_dir(provider: P, state_dir: impl AsRef<Path>) -> Self {
        let dir = state_dir.as_ref();
        Self::new(
            provider,
            Arc::new(FileKillFlag::in_dir(dir)),
            ServiceJournal::in_dir(dir),
        )
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn journal(&self) -> &ServiceJournal {
        &self.journal
    }

    pub fn is_recording(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| worker.running.load(Ordering::SeqCst))
    }

    /// The host removed the app's task while recording.
    ///
    /// Blocks until the service thread exits. Returns whether a recording
    /// was ended.
    pub fn on_task_removed(&self) -> bool {
        self.terminate(StopReason::TaskRemoved)
    }

    /// End a running recording for a reason other than an explicit stop.
    ///
    /// Stops capture, raises the kill flag and emits
    /// `serviceState(stopped, reason)`. Does nothing when idle.
    pub fn terminate(&self, reason: StopReason) -> bool {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return false;
        };
        self.teardown(worker)
            .run(Ending::Killed(reason, Arc::clone(&self.kill_flag)))
            .unwrap_or(true)
    }

    /// Raise the kill flag if a previous process died mid-recording.
    ///
    /// Runs at construction; returns whether the flag was raised.
    pub fn recover_abandoned_session(&self) -> bool {
        let session_id = match self.journal.take_abandoned() {
            Ok(None) => return false,
            Ok(Some(entry)) => Some(entry.session_id),
            Err(JournalError::Corrupt(e)) => {
                log::warn!("discarded corrupt service journal: {}", e);
                None
            }
            Err(e) => {
                log::error!("failed to read service journal: {}", e);
                return false;
            }
        };

        log::warn!(
            "recording {} never finished, previous process was killed",
            session_id.map(|id| id.to_string()).unwrap_or_default()
        );
        match self
            .kill_flag
            .set(KillRecord::new(StopReason::ProcessKilled, session_id))
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to raise kill flag: {}", e);
                false
            }
        }
    }

    fn teardown(&self, worker: Worker) -> Teardown<P> {
        Teardown {
            worker,
            provider: Arc::clone(&self.provider),
            journal: self.journal.clone(),
            delegate: self.delegate.lock().clone(),
        }
    }

    /// Ring capacity for one recording: `buffered_seconds` of audio, which
    /// must hold at least two chunks.
    fn sink_capacity(&self, config: &CaptureConfiguration) -> Result<usize, CaptureError> {
        let chunk_size = config.effective_buffer_size();
        let capacity = config
            .bytes_per_second()
            .checked_mul(self.settings.buffered_seconds)
            .ok_or_else(|| CaptureError::ConfigurationFailed("frame buffer size overflows".into()))?;
        match chunk_size.checked_mul(2) {
            Some(needed) if needed <= capacity => Ok(capacity),
            _ => Err(CaptureError::ConfigurationFailed(format!(
                "buffer size {} does not fit in {} s of buffered audio",
                chunk_size, self.settings.buffered_seconds
            ))),
        }
    }

    fn discard_worker(&self, session_id: Uuid) {
        let mut slot = self.worker.lock();
        if slot.as_ref().is_some_and(|w| w.session_id == session_id) {
            *slot = None;
        }
    }

    fn refuse(&self, delegate: &dyn CaptureDelegate, error: CaptureError) -> CaptureError {
        log::warn!("service start refused: {}", error);
        delegate.on_error(&error.to_string());
        error
    }
}

#[async_trait]
impl<P: CaptureProvider + 'static> CaptureBackend for BackgroundRecordingService<P> {
    fn attach(&self, delegate: Arc<dyn CaptureDelegate>) {
        *self.delegate.lock() = Some(delegate);
    }

    fn init(&self, config: &CaptureConfiguration) -> Result<(), CaptureError> {
        if self.is_recording() {
            log::debug!("service reconfigured while recording, applies to the next start");
        }
        *self.config.lock() = Some(config.clone());
        Ok(())
    }

    async fn start(&self) -> Result<String, CaptureError> {
        // a stop that outlived its caller must finish before the device is reused
        drop(self.lifecycle.lock().await);

        let config = self
            .config
            .lock()
            .clone()
            .ok_or_else(|| CaptureError::ConfigurationFailed("service not initialized".into()))?;
        let delegate = self
            .delegate
            .lock()
            .clone()
            .ok_or_else(|| CaptureError::ConfigurationFailed("no event delegate attached".into()))?;

        let capacity = self
            .sink_capacity(&config)
            .map_err(|e| self.refuse(delegate.as_ref(), e))?;
        let (permitted, available) = {
            let provider = self.provider.lock();
            (provider.has_permission(), provider.is_available())
        };
        if !permitted {
            return Err(self.refuse(delegate.as_ref(), CaptureError::PermissionDenied));
        }
        if !available {
            return Err(self.refuse(delegate.as_ref(), CaptureError::DeviceNotAvailable));
        }

        let session_id = Uuid::new_v4();
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut slot = self.worker.lock();
            if slot
                .as_ref()
                .is_some_and(|w| w.running.load(Ordering::SeqCst))
            {
                return Err(CaptureError::ConfigurationFailed(
                    "service is already recording".into(),
                ));
            }

            let worker = ServiceWorker {
                session_id,
                provider: Arc::clone(&self.provider),
                sink: FrameSink::new(capacity),
                running: Arc::clone(&running),
                delegate,
                journal: self.journal.clone(),
                settings: self.settings,
                config,
            };
            let handle = thread::Builder::new()
                .name("live-audio-service".into())
                .spawn(move || worker.run(ready_tx))
                .map_err(|e| CaptureError::Unknown(format!("failed to spawn service thread: {}", e)))?;

            // a previous worker here has already finished; dropping it detaches the thread
            *slot = Some(Worker {
                session_id,
                running,
                handle,
            });
        }

        match ready_rx.await {
            Ok(Ok(())) => {
                log::info!("service recording {} started", session_id);
                Ok(ACK_STARTED.to_string())
            }
            Ok(Err(e)) => {
                log::error!("provider failed to start: {}", e);
                self.discard_worker(session_id);
                Err(e)
            }
            Err(_) => {
                self.discard_worker(session_id);
                Err(CaptureError::Unknown(
                    "service thread exited before capture started".into(),
                ))
            }
        }
    }

    async fn stop(&self) -> Result<String, CaptureError> {
        let lifecycle = Arc::clone(&self.lifecycle).lock_owned().await;
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            log::debug!("service stop with no active recording");
            return Ok(ACK_STOPPED.to_string());
        };

        // the blocking task completes even if this future is dropped
        let teardown = self.teardown(worker);
        let joined = tokio::task::spawn_blocking(move || {
            let _lifecycle = lifecycle;
            teardown.run(Ending::Stopped)
        })
        .await;

        match joined {
            Ok(stopped) => stopped.map(|_| ACK_STOPPED.to_string()),
            Err(e) => Err(CaptureError::Unknown(format!("stop task failed: {}", e))),
        }
    }

    /// Tear down a capture whose `start` was abandoned. Blocks until the
    /// service thread exits; the kill flag stays down.
    fn abort(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = self.teardown(worker).run(Ending::Aborted);
        }
    }

    fn kill_flag_store(&self) -> Option<Arc<dyn KillFlagStore>> {
        Some(Arc::clone(&self.kill_flag))
    }
}

impl<P: CaptureProvider + 'static> Drop for BackgroundRecordingService<P> {
    fn drop(&mut self) {
        self.terminate(StopReason::Destroy);
    }
}

/// Why a recording is being torn down.
enum Ending {
    /// Host `stop()`.
    Stopped,
    /// The `start` future was dropped before it resolved.
    Aborted,
    /// Task removal or destruction; raises the kill flag.
    Killed(StopReason, Arc<dyn KillFlagStore>),
}

/// Everything needed to end one recording, detached from the service so it
/// can run on a blocking thread.
struct Teardown<P: CaptureProvider> {
    worker: Worker,
    provider: Arc<Mutex<P>>,
    journal: ServiceJournal,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl<P: CaptureProvider> Teardown<P> {
    /// Stop the provider, join the service thread, clear the journal and
    /// report the ending. Returns whether the recording was still live.
    fn run(self, ending: Ending) -> Result<bool, CaptureError> {
        let Worker {
            session_id,
            running,
            handle,
        } = self.worker;

        let was_running = running.swap(false, Ordering::SeqCst);
        let stopped = if was_running {
            self.provider.lock().stop()
        } else {
            Ok(())
        };
        if let Err(e) = &stopped {
            log::warn!("provider did not stop cleanly: {}", e);
        }
        if handle.join().is_err() {
            log::error!("service thread panicked");
        }

        if let Ending::Killed(reason, kill_flag) = &ending {
            if was_running {
                log::warn!("recording {} terminated ({})", session_id, reason);
                if let Err(e) = kill_flag.set(KillRecord::new(reason.clone(), Some(session_id))) {
                    log::error!("failed to raise kill flag: {}", e);
                }
            }
        }
        if let Err(e) = self.journal.finish() {
            log::warn!("failed to clear service journal: {}", e);
        }

        let delegate = self.delegate.as_deref();
        match ending {
            Ending::Stopped => {
                log::info!("service recording {} stopped", session_id);
                if let Some(delegate) = delegate {
                    if was_running {
                        delegate.on_recording_state(false);
                    }
                    delegate.on_service_state(ServiceStateChange::stopped(StopReason::ActionStop));
                }
            }
            Ending::Aborted if was_running => {
                log::warn!("recording {} abandoned before start resolved", session_id);
                if let Some(delegate) = delegate {
                    delegate.on_recording_state(false);
                }
            }
            Ending::Killed(reason, _) if was_running => {
                if let Some(delegate) = delegate {
                    delegate.on_recording_state(false);
                    delegate.on_service_state(ServiceStateChange::stopped(reason));
                }
            }
            Ending::Aborted | Ending::Killed(..) => {}
        }

        stopped.map(|()| was_running)
    }
}

/// Everything the service thread owns for one recording.
struct ServiceWorker<P: CaptureProvider> {
    session_id: Uuid,
    provider: Arc<Mutex<P>>,
    sink: FrameSink,
    running: Arc<AtomicBool>,
    delegate: Arc<dyn CaptureDelegate>,
    journal: ServiceJournal,
    settings: ServiceSettings,
    config: CaptureConfiguration,
}

impl<P: CaptureProvider> ServiceWorker<P> {
    fn run(self, ready: oneshot::Sender<Result<(), CaptureError>>) {
        if let Err(e) = self.open_device() {
            self.running.store(false, Ordering::SeqCst);
            let _ = ready.send(Err(e));
            return;
        }

        let entry = JournalEntry::new(self.session_id, &self.config.wav_file);
        if let Err(e) = self.journal.begin(&entry) {
            log::warn!("failed to write service journal: {}", e);
        }
        self.delegate.on_recording_state(true);

        if ready.send(Ok(())).is_err() {
            log::warn!("start of recording {} abandoned, releasing device", self.session_id);
            if self.release_device() {
                self.delegate.on_recording_state(false);
            }
            return;
        }

        let chunk_size = self.config.effective_buffer_size();
        let mut encoder = ChunkEncoder::new(self.settings.skip_leading_chunks);
        while self.running.load(Ordering::SeqCst) {
            thread::sleep(self.settings.poll_interval);
            self.drain(chunk_size, &mut encoder);

            if let Some(message) = self.sink.take_failure() {
                log::error!("capture failed: {}", message);
                // a concurrent stop or terminate already owns teardown
                if self.release_device() {
                    self.delegate
                        .on_capture_failed(&format!("Error reading audio data: {}", message));
                    self.delegate.on_recording_state(false);
                }
                return;
            }
        }

        self.drain(chunk_size, &mut encoder);
        log::debug!(
            "service thread for {} exiting after {} chunks",
            self.session_id,
            encoder.emitted()
        );
    }

    /// Start the provider. If the recording was ended while the provider
    /// was starting, stop it again under the same lock.
    fn open_device(&self) -> Result<(), CaptureError> {
        let mut provider = self.provider.lock();
        provider.start(&self.config, self.sink.clone())?;
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = provider.stop() {
            log::warn!("provider did not stop cleanly: {}", e);
        }
        Err(CaptureError::Unknown(
            "recording ended before capture started".into(),
        ))
    }

    fn drain(&self, chunk_size: usize, encoder: &mut ChunkEncoder) {
        while let Some(chunk) = self.sink.next_chunk(chunk_size) {
            if let Some(payload) = encoder.encode(&chunk) {
                self.delegate.on_data(payload);
            }
        }
    }

    /// Stop the provider if this thread wins the race to end the recording.
    fn release_device(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.provider.lock().stop() {
            log::warn!("provider did not stop cleanly: {}", e);
        }
        if let Err(e) = self.journal.finish() {
            log::warn!("failed to clear service journal: {}", e);
        }
        true
    }
}
