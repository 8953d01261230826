//! Scripted provider and helpers shared by the service tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use live_audio_core::{CaptureConfiguration, CaptureError, CaptureProvider, FrameSink};
use parking_lot::Mutex;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct ControlState {
    available: bool,
    permission: bool,
    start_error: Option<CaptureError>,
    stop_error: Option<CaptureError>,
    sink: Option<FrameSink>,
    start_delay: Duration,
    stop_delay: Duration,
    starts: usize,
    stops: usize,
}

/// Test-side handle to a [`ScriptedProvider`]: feeds frames and flips failures.
#[derive(Clone)]
pub(crate) struct ProviderControl {
    state: Arc<Mutex<ControlState>>,
}

impl ProviderControl {
    pub(crate) fn deny_permission(&self) {
        self.state.lock().permission = false;
    }

    pub(crate) fn unplug(&self) {
        self.state.lock().available = false;
    }

    pub(crate) fn fail_start(&self, error: CaptureError) {
        self.state.lock().start_error = Some(error);
    }

    pub(crate) fn fail_stop(&self, error: CaptureError) {
        self.state.lock().stop_error = Some(error);
    }

    /// Make `start` take `delay` before the device is open.
    pub(crate) fn delay_start(&self, delay: Duration) {
        self.state.lock().start_delay = delay;
    }

    /// Make `stop` take `delay` after the device is closed.
    pub(crate) fn delay_stop(&self, delay: Duration) {
        self.state.lock().stop_delay = delay;
    }

    /// Push PCM as the device would. Returns false when not capturing.
    pub(crate) fn push(&self, pcm: &[u8]) -> bool {
        match &self.state.lock().sink {
            Some(sink) => {
                sink.push(pcm);
                true
            }
            None => false,
        }
    }

    pub(crate) fn fail(&self, message: &str) {
        if let Some(sink) = &self.state.lock().sink {
            sink.fail(message);
        }
    }

    pub(crate) fn is_capturing(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    pub(crate) fn starts(&self) -> usize {
        self.state.lock().starts
    }

    pub(crate) fn stops(&self) -> usize {
        self.state.lock().stops
    }
}

/// Provider whose frames are pushed by the test through [`ProviderControl`].
pub(crate) struct ScriptedProvider {
    control: ProviderControl,
}

impl ScriptedProvider {
    pub(crate) fn new() -> (Self, ProviderControl) {
        let control = ProviderControl {
            state: Arc::new(Mutex::new(ControlState {
                available: true,
                permission: true,
                start_error: None,
                stop_error: None,
                sink: None,
                start_delay: Duration::ZERO,
                stop_delay: Duration::ZERO,
                starts: 0,
                stops: 0,
            })),
        };
        (Self { control: control.clone() }, control)
    }
}

impl CaptureProvider for ScriptedProvider {
    fn is_available(&self) -> bool {
        self.control.state.lock().available
    }

    fn has_permission(&self) -> bool {
        self.control.state.lock().permission
    }

    fn start(&mut self, _config: &CaptureConfiguration, sink: FrameSink) -> Result<(), CaptureError> {
        let delay = {
            let mut state = self.control.state.lock();
            state.starts += 1;
            if let Some(e) = state.start_error.clone() {
                return Err(e);
            }
            state.start_delay
        };
        thread::sleep(delay);
        self.control.state.lock().sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let (delay, result) = {
            let mut state = self.control.state.lock();
            state.stops += 1;
            state.sink = None;
            (state.stop_delay, state.stop_error.clone())
        };
        thread::sleep(delay);
        match result {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
